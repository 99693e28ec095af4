//! Wire protocol shared by `swkvm-controller` and `swkvm-peerd`: the fixed
//! event frame, the AEAD envelope, and the key-file reader.

pub mod crypto;
pub mod frame;
pub mod keyfile;

pub use crypto::{CryptoError, Envelope, CONTEXT_LEN, KEY_LEN, TAG_OVERHEAD};
pub use frame::{Frame, FrameError, FRAME_LEN};
pub use keyfile::{read_key, KeyFileError};
