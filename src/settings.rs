//! HTTP/2 settings management
//!
//! SETTINGS parameters, validation and the 6-bytes-per-entry wire format
//! from RFC 7540 Section 6.5. Also carries the RFC 8441 and RFC 9218
//! extension parameters.

use crate::error::{Error, Result};
use bytes::{BufMut, BytesMut};
use std::fmt;

/// HTTP/2 settings parameters (RFC 7540 Section 6.5.2)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum SettingsParameter {
    /// SETTINGS_HEADER_TABLE_SIZE (0x1): maximum size of the peer-facing
    /// HPACK dynamic table
    HeaderTableSize = 0x1,

    /// SETTINGS_ENABLE_PUSH (0x2): used to disable server push
    EnablePush = 0x2,

    /// SETTINGS_MAX_CONCURRENT_STREAMS (0x3)
    MaxConcurrentStreams = 0x3,

    /// SETTINGS_INITIAL_WINDOW_SIZE (0x4): sender's initial window for
    /// stream-level flow control
    InitialWindowSize = 0x4,

    /// SETTINGS_MAX_FRAME_SIZE (0x5): largest acceptable frame payload
    MaxFrameSize = 0x5,

    /// SETTINGS_MAX_HEADER_LIST_SIZE (0x6)
    MaxHeaderListSize = 0x6,

    /// SETTINGS_ENABLE_CONNECT_PROTOCOL (0x8) - RFC 8441
    EnableConnectProtocol = 0x8,

    /// SETTINGS_NO_RFC7540_PRIORITIES (0x9) - RFC 9218
    NoRfc7540Priorities = 0x9,
}

impl SettingsParameter {
    /// Convert to u16
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    /// Create from u16
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0x1 => Some(SettingsParameter::HeaderTableSize),
            0x2 => Some(SettingsParameter::EnablePush),
            0x3 => Some(SettingsParameter::MaxConcurrentStreams),
            0x4 => Some(SettingsParameter::InitialWindowSize),
            0x5 => Some(SettingsParameter::MaxFrameSize),
            0x6 => Some(SettingsParameter::MaxHeaderListSize),
            0x8 => Some(SettingsParameter::EnableConnectProtocol),
            0x9 => Some(SettingsParameter::NoRfc7540Priorities),
            _ => None,
        }
    }

    /// Get parameter name
    pub fn name(&self) -> &'static str {
        match self {
            SettingsParameter::HeaderTableSize => "HEADER_TABLE_SIZE",
            SettingsParameter::EnablePush => "ENABLE_PUSH",
            SettingsParameter::MaxConcurrentStreams => "MAX_CONCURRENT_STREAMS",
            SettingsParameter::InitialWindowSize => "INITIAL_WINDOW_SIZE",
            SettingsParameter::MaxFrameSize => "MAX_FRAME_SIZE",
            SettingsParameter::MaxHeaderListSize => "MAX_HEADER_LIST_SIZE",
            SettingsParameter::EnableConnectProtocol => "ENABLE_CONNECT_PROTOCOL",
            SettingsParameter::NoRfc7540Priorities => "NO_RFC7540_PRIORITIES",
        }
    }
}

impl fmt::Display for SettingsParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:x})", self.name(), self.as_u16())
    }
}

/// HTTP/2 settings
///
/// `None` means "not advertised"; the RFC default applies until the peer
/// says otherwise.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    /// Header table size (default: 4096)
    pub header_table_size: Option<u32>,

    /// Enable server push (default: true)
    pub enable_push: Option<bool>,

    /// Maximum concurrent streams (default: unlimited)
    pub max_concurrent_streams: Option<u32>,

    /// Initial window size (default: 65535)
    pub initial_window_size: Option<u32>,

    /// Maximum frame size (default: 16384, range: 16384-16777215)
    pub max_frame_size: Option<u32>,

    /// Maximum header list size (default: unlimited)
    pub max_header_list_size: Option<u32>,

    /// Enable CONNECT protocol (default: false)
    pub enable_connect_protocol: Option<bool>,

    /// Disable RFC 7540 priorities (default: false)
    pub no_rfc7540_priorities: Option<bool>,
}

impl Settings {
    /// Create empty settings (nothing advertised)
    pub fn new() -> Self {
        Settings::default()
    }

    /// Get header table size (with default)
    pub fn header_table_size(&self) -> u32 {
        self.header_table_size.unwrap_or(4096)
    }

    /// Get enable push (with default)
    pub fn enable_push(&self) -> bool {
        self.enable_push.unwrap_or(true)
    }

    /// Get max concurrent streams (None = unlimited)
    pub fn max_concurrent_streams(&self) -> Option<u32> {
        self.max_concurrent_streams
    }

    /// Get initial window size (with default)
    pub fn initial_window_size(&self) -> u32 {
        self.initial_window_size.unwrap_or(65535)
    }

    /// Get max frame size (with default)
    pub fn max_frame_size(&self) -> u32 {
        self.max_frame_size.unwrap_or(16384)
    }

    /// Get max header list size (None = unlimited)
    pub fn max_header_list_size(&self) -> Option<u32> {
        self.max_header_list_size
    }

    /// Get enable CONNECT protocol (with default)
    pub fn enable_connect_protocol(&self) -> bool {
        self.enable_connect_protocol.unwrap_or(false)
    }

    /// Get no RFC 7540 priorities (with default)
    pub fn no_rfc7540_priorities(&self) -> bool {
        self.no_rfc7540_priorities.unwrap_or(false)
    }

    /// Validate settings values per RFC 7540 Section 6.5.2
    pub fn validate(&self) -> Result<()> {
        if let Some(initial_window_size) = self.initial_window_size {
            if initial_window_size > 0x7FFF_FFFF {
                return Err(Error::InvalidSettings(format!(
                    "initial window size {} exceeds maximum (2^31-1)",
                    initial_window_size
                )));
            }
        }

        if let Some(max_frame_size) = self.max_frame_size {
            if !(16_384..=16_777_215).contains(&max_frame_size) {
                return Err(Error::InvalidSettings(format!(
                    "max frame size {} outside valid range (16384-16777215)",
                    max_frame_size
                )));
            }
        }

        Ok(())
    }

    /// Merge settings from another Settings object
    /// (values in `other` override values in `self`)
    pub fn merge(&mut self, other: &Settings) {
        macro_rules! take {
            ($field:ident) => {
                if other.$field.is_some() {
                    self.$field = other.$field;
                }
            };
        }
        take!(header_table_size);
        take!(enable_push);
        take!(max_concurrent_streams);
        take!(initial_window_size);
        take!(max_frame_size);
        take!(max_header_list_size);
        take!(enable_connect_protocol);
        take!(no_rfc7540_priorities);
    }

    /// Encode the advertised parameters as a SETTINGS payload
    /// (6 bytes per entry: u16 id, u32 value).
    pub fn encode_payload(&self) -> BytesMut {
        let mut buf = BytesMut::new();

        let mut put = |param: SettingsParameter, value: u32| {
            buf.put_u16(param.as_u16());
            buf.put_u32(value);
        };

        if let Some(v) = self.header_table_size {
            put(SettingsParameter::HeaderTableSize, v);
        }
        if let Some(v) = self.enable_push {
            put(SettingsParameter::EnablePush, v as u32);
        }
        if let Some(v) = self.max_concurrent_streams {
            put(SettingsParameter::MaxConcurrentStreams, v);
        }
        if let Some(v) = self.initial_window_size {
            put(SettingsParameter::InitialWindowSize, v);
        }
        if let Some(v) = self.max_frame_size {
            put(SettingsParameter::MaxFrameSize, v);
        }
        if let Some(v) = self.max_header_list_size {
            put(SettingsParameter::MaxHeaderListSize, v);
        }
        if let Some(v) = self.enable_connect_protocol {
            put(SettingsParameter::EnableConnectProtocol, v as u32);
        }
        if let Some(v) = self.no_rfc7540_priorities {
            put(SettingsParameter::NoRfc7540Priorities, v as u32);
        }

        buf
    }

    /// Parse a SETTINGS payload. The length must be a multiple of 6
    /// (FRAME_SIZE_ERROR otherwise); unknown parameters are ignored;
    /// ENABLE_PUSH must be 0 or 1.
    pub fn parse_payload(payload: &[u8]) -> Result<Settings> {
        if payload.len() % 6 != 0 {
            return Err(Error::FrameSize(format!(
                "SETTINGS payload length {} not a multiple of 6",
                payload.len()
            )));
        }

        let mut settings = Settings::new();
        for entry in payload.chunks_exact(6) {
            let id = u16::from_be_bytes([entry[0], entry[1]]);
            let value = u32::from_be_bytes([entry[2], entry[3], entry[4], entry[5]]);

            match SettingsParameter::from_u16(id) {
                Some(SettingsParameter::HeaderTableSize) => {
                    settings.header_table_size = Some(value)
                }
                Some(SettingsParameter::EnablePush) => {
                    if value > 1 {
                        return Err(Error::Protocol(format!(
                            "SETTINGS_ENABLE_PUSH must be 0 or 1, got {}",
                            value
                        )));
                    }
                    settings.enable_push = Some(value != 0);
                }
                Some(SettingsParameter::MaxConcurrentStreams) => {
                    settings.max_concurrent_streams = Some(value)
                }
                Some(SettingsParameter::InitialWindowSize) => {
                    if value > 0x7FFF_FFFF {
                        return Err(Error::FlowControl(format!(
                            "SETTINGS_INITIAL_WINDOW_SIZE {} exceeds 2^31-1",
                            value
                        )));
                    }
                    settings.initial_window_size = Some(value);
                }
                Some(SettingsParameter::MaxFrameSize) => {
                    if !(16_384..=16_777_215).contains(&value) {
                        return Err(Error::Protocol(format!(
                            "SETTINGS_MAX_FRAME_SIZE {} outside 16384-16777215",
                            value
                        )));
                    }
                    settings.max_frame_size = Some(value);
                }
                Some(SettingsParameter::MaxHeaderListSize) => {
                    settings.max_header_list_size = Some(value)
                }
                Some(SettingsParameter::EnableConnectProtocol) => {
                    settings.enable_connect_protocol = Some(value != 0)
                }
                Some(SettingsParameter::NoRfc7540Priorities) => {
                    settings.no_rfc7540_priorities = Some(value != 0)
                }
                // Unknown settings are ignored per RFC 7540 Section 6.5.2
                None => {}
            }
        }

        Ok(settings)
    }
}

/// Builder for HTTP/2 settings
pub struct SettingsBuilder {
    settings: Settings,
}

impl SettingsBuilder {
    /// Create a new settings builder
    pub fn new() -> Self {
        SettingsBuilder {
            settings: Settings::new(),
        }
    }

    /// Set header table size
    pub fn header_table_size(mut self, size: u32) -> Self {
        self.settings.header_table_size = Some(size);
        self
    }

    /// Set enable push
    pub fn enable_push(mut self, enable: bool) -> Self {
        self.settings.enable_push = Some(enable);
        self
    }

    /// Set max concurrent streams
    pub fn max_concurrent_streams(mut self, max: u32) -> Self {
        self.settings.max_concurrent_streams = Some(max);
        self
    }

    /// Set initial window size
    pub fn initial_window_size(mut self, size: u32) -> Self {
        self.settings.initial_window_size = Some(size);
        self
    }

    /// Set max frame size
    pub fn max_frame_size(mut self, size: u32) -> Self {
        self.settings.max_frame_size = Some(size);
        self
    }

    /// Set max header list size
    pub fn max_header_list_size(mut self, size: u32) -> Self {
        self.settings.max_header_list_size = Some(size);
        self
    }

    /// Set enable CONNECT protocol
    pub fn enable_connect_protocol(mut self, enable: bool) -> Self {
        self.settings.enable_connect_protocol = Some(enable);
        self
    }

    /// Set no RFC 7540 priorities
    pub fn no_rfc7540_priorities(mut self, disable: bool) -> Self {
        self.settings.no_rfc7540_priorities = Some(disable);
        self
    }

    /// Build the settings
    pub fn build(self) -> Result<Settings> {
        self.settings.validate()?;
        Ok(self.settings)
    }
}

impl Default for SettingsBuilder {
    fn default() -> Self {
        Self::new()
    }
}
