mod chat_service;
mod registration_service;


pub use chat_service::{ChatService, ChatServiceDependencies, PostMessageRequest};
pub use registration_service::{
    RegisterGuestRequest, RegistrationService, RegistrationServiceDependencies,
};
