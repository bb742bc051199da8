//! Hardware-facing infrastructure: bit timing arithmetic, the mailbox
//! register image, and the collaborator traits.
pub mod mailbox_ram;
pub mod timing;
pub mod traits;
