/*!
 * Capture Options
 * Options forwarded to the hooked capture library via the environment
 */

use crate::core::errors::{LaunchError, Result};
use serde::{Deserialize, Serialize};

/// Options controlling how the hooked library captures the target.
///
/// The encoded form travels through a single environment variable, so it
/// must stay printable ASCII and stable across versions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CaptureOptions {
    pub api_validation: bool,
    pub capture_callstacks: bool,
    pub allow_vsync: bool,
    pub allow_fullscreen: bool,
    pub hook_into_children: bool,
    pub ref_all_resources: bool,
    pub verify_buffer_access: bool,
    /// Seconds to wait after the handshake before resuming the target, so
    /// a debugger can attach
    pub delay_for_debugger: u32,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            api_validation: false,
            capture_callstacks: false,
            allow_vsync: true,
            allow_fullscreen: true,
            hook_into_children: false,
            ref_all_resources: false,
            verify_buffer_access: false,
            delay_for_debugger: 0,
        }
    }
}

impl CaptureOptions {
    fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![
            self.api_validation as u8,
            self.capture_callstacks as u8,
            self.allow_vsync as u8,
            self.allow_fullscreen as u8,
            self.hook_into_children as u8,
            self.ref_all_resources as u8,
            self.verify_buffer_access as u8,
        ];
        bytes.extend_from_slice(&self.delay_for_debugger.to_le_bytes());
        bytes
    }

    /// Encode as printable ASCII: each byte becomes two letters, 'a' plus
    /// the high then low nibble.
    #[must_use]
    pub fn encode(&self) -> String {
        let mut out = String::new();
        for byte in self.to_bytes() {
            out.push((b'a' + (byte >> 4)) as char);
            out.push((b'a' + (byte & 0xf)) as char);
        }
        out
    }

    /// Decode the wire form produced by [`encode`](Self::encode), as the
    /// hooked library does inside the target process.
    pub fn decode(encoded: &str) -> Result<Self> {
        let nibbles: Vec<u8> = encoded
            .bytes()
            .map(|c| {
                c.checked_sub(b'a')
                    .filter(|&n| n < 16)
                    .ok_or_else(|| bad_options(encoded))
            })
            .collect::<Result<_>>()?;

        if nibbles.len() != 22 {
            return Err(bad_options(encoded));
        }

        let bytes: Vec<u8> = nibbles
            .chunks_exact(2)
            .map(|pair| (pair[0] << 4) | pair[1])
            .collect();

        let mut delay = [0u8; 4];
        delay.copy_from_slice(&bytes[7..11]);

        Ok(Self {
            api_validation: bytes[0] != 0,
            capture_callstacks: bytes[1] != 0,
            allow_vsync: bytes[2] != 0,
            allow_fullscreen: bytes[3] != 0,
            hook_into_children: bytes[4] != 0,
            ref_all_resources: bytes[5] != 0,
            verify_buffer_access: bytes[6] != 0,
            delay_for_debugger: u32::from_le_bytes(delay),
        })
    }
}

fn bad_options(encoded: &str) -> LaunchError {
    LaunchError::InvalidParameter(format!("malformed capture options '{}'", encoded))
}
