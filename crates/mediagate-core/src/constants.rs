//! Application-wide constants

/// Sample rate every stored audio file is normalized to.
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Container hint for voice notes and audio attachments (Telegram delivers Ogg/Opus).
pub const VOICE_CONTAINER_HINT: &str = "ogg";

/// Greeting sent in reply to `/start`.
pub const START_MESSAGE: &str =
    "Send me photo with face or audio and I'll save these files to my database.";

pub const REPLY_IMAGE_SAVED: &str = "Image saved!";
pub const REPLY_AUDIO_SAVED: &str = "Audio saved!";
pub const REPLY_NO_FACE: &str = "No face found in image.";
pub const REPLY_NOT_AN_IMAGE: &str = "Sorry, it's not an image file.";
pub const REPLY_STORAGE_FAILED: &str = "Sorry, I couldn't save your file.";
pub const REPLY_DECODE_FAILED: &str = "Sorry, I couldn't read that file.";
pub const REPLY_TRANSPORT_FAILED: &str = "Sorry, I couldn't download your file.";
pub const REPLY_INTERNAL_ERROR: &str = "Sorry, something went wrong.";
