use std::sync::Arc;

use application::RoomRegistry;

#[derive(Clone)]
pub struct AppState {
    pub rooms: Arc<RoomRegistry>,
}

impl AppState {
    pub fn new(rooms: Arc<RoomRegistry>) -> Self {
        Self { rooms }
    }
}
