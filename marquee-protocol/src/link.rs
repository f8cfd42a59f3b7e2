//! Display-link commands
//!
//! The LED-matrix panel is driven by its own controller reached over a
//! UART; it owns fonts, scrolling, and pixel geometry. The engine only
//! sends it these commands. Frames are postcard-encoded with COBS
//! framing, so the zero byte delimits frames and the receiver can
//! resynchronize after a corrupt frame.

use heapless::String;
use serde::{Deserialize, Serialize};

/// Maximum text length in a single show command. Matches the longest
/// stored message (a news item).
pub const LINK_TEXT_MAX: usize = 512;

/// Maximum encoded frame length, including COBS overhead and the
/// trailing delimiter.
pub const MAX_FRAME_LEN: usize = LINK_TEXT_MAX + 16;

/// Commands sent to the panel controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkCommand {
    /// Blank the panel (ticker has nothing to show)
    Clear,
    /// Panel brightness, 0..=15
    SetIntensity(u8),
    /// Scroll `text` once at the given speed step
    ShowText { speed: u8, text: String<LINK_TEXT_MAX> },
}

/// Errors from link encode/decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkError {
    /// Destination buffer too small
    BufferTooSmall,
    /// Frame did not decode to a valid command
    Malformed,
}

/// Encode a command into `buf`, returning the encoded frame slice.
pub fn encode<'a>(cmd: &LinkCommand, buf: &'a mut [u8]) -> Result<&'a [u8], LinkError> {
    postcard::to_slice_cobs(cmd, buf)
        .map(|s| &*s)
        .map_err(|_| LinkError::BufferTooSmall)
}

/// Decode one COBS frame (delimiter included or not) back into a command.
pub fn decode(frame: &mut [u8]) -> Result<LinkCommand, LinkError> {
    postcard::from_bytes_cobs(frame).map_err(|_| LinkError::Malformed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_round_trip() {
        let mut text: String<LINK_TEXT_MAX> = String::new();
        text.push_str("breaking: something happened").unwrap();
        let cmd = LinkCommand::ShowText { speed: 25, text };

        let mut buf = [0u8; MAX_FRAME_LEN];
        let frame_len = encode(&cmd, &mut buf).unwrap().len();
        let mut frame = [0u8; MAX_FRAME_LEN];
        frame[..frame_len].copy_from_slice(&buf[..frame_len]);

        assert_eq!(decode(&mut frame[..frame_len]).unwrap(), cmd);
    }

    #[test]
    fn test_corrupt_frame_rejected() {
        let mut buf = [0u8; 32];
        let len = encode(&LinkCommand::SetIntensity(9), &mut buf).unwrap().len();
        buf[1] ^= 0xff;
        assert!(decode(&mut buf[..len]).is_err());
    }
}
