use crate::chat::ChatHubHandle;
use crate::sessions::SessionManagerHandle;

#[derive(Clone)]
pub struct AppState {
    pub session_manager: SessionManagerHandle,
    pub chat_hub: ChatHubHandle,
}
