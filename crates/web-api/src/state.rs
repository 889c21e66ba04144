use std::sync::Arc;

use application::{ChatService, RegistrationService};

#[derive(Clone)]
pub struct AppState {
    pub registration_service: Arc<RegistrationService>,
    pub chat_service: Arc<ChatService>,
}

impl AppState {
    pub fn new(
        registration_service: Arc<RegistrationService>,
        chat_service: Arc<ChatService>,
    ) -> Self {
        Self {
            registration_service,
            chat_service,
        }
    }
}
