pub mod chat_client;
pub mod config;
pub mod error;
pub mod image_client;

pub use chat_client::{ChatEndpoint, ChatTurnReply, ChatTurnRequest, HttpChatClient};
pub use config::EndpointConfig;
pub use error::TransportError;
pub use image_client::{
    HttpImageClient, ImageEndpoint, ImageGenerationReply, ImageGenerationRequest,
    normalize_image_payload,
};
