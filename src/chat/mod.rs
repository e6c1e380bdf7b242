pub mod composer;
pub mod conversations;
pub mod meeting;
pub mod messages;
pub mod session;

pub use composer::Composer;
pub use conversations::ConversationStore;
pub use meeting::MeetingRoom;
pub use messages::MessageStore;
pub use session::{ChatSession, SessionOptions};
