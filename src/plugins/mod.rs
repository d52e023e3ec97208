pub mod videoroom;

pub use videoroom::{Joined, RoomCreated, VideoRoomHandle, VideoRoomPlugin, VideoRoomRole, VIDEOROOM_PLUGIN};
