//! Generic Audio bitfields and codec-specific-configuration value types
//! shared by the ASE codec configuration and metadata TLVs.
//!
//! Grounded in the Bluetooth Generic Audio assigned numbers as the
//! teacher's PACS-era `generic_audio` module enumerated them; trimmed to
//! the subset the Audio Stream Control Service actually carries (codec
//! and metadata *values*, not PACS's advertised-capability bitmasks).

use bitflags::bitflags;

bitflags! {
    /// Audio_Channel_Allocation codec-specific-configuration value: a
    /// bitmap of speaker positions, not a single selected value.
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct AudioLocation: u32 {
        const FRONT_LEFT = 0x0000_0001;
        const FRONT_RIGHT = 0x0000_0002;
        const FRONT_CENTER = 0x0000_0004;
        const LOW_FREQUENCY_EFFECTS_1 = 0x0000_0008;
        const BACK_LEFT = 0x0000_0010;
        const BACK_RIGHT = 0x0000_0020;
        const FRONT_LEFT_OF_CENTER = 0x0000_0040;
        const FRONT_RIGHT_OF_CENTER = 0x0000_0080;
        const BACK_CENTER = 0x0000_0100;
        const LOW_FREQUENCY_EFFECTS_2 = 0x0000_0200;
        const SIDE_LEFT = 0x0000_0400;
        const SIDE_RIGHT = 0x0000_0800;
        const TOP_FRONT_LEFT = 0x0000_1000;
        const TOP_FRONT_RIGHT = 0x0000_2000;
        const TOP_FRONT_CENTER = 0x0000_4000;
        const TOP_CENTER = 0x0000_8000;
        const TOP_BACK_LEFT = 0x0001_0000;
        const TOP_BACK_RIGHT = 0x0002_0000;
        const TOP_SIDE_LEFT = 0x0004_0000;
        const TOP_SIDE_RIGHT = 0x0008_0000;
        const TOP_BACK_CENTER = 0x0010_0000;
        const BOTTOM_FRONT_CENTER = 0x0020_0000;
        const BOTTOM_FRONT_LEFT = 0x0040_0000;
        const BOTTOM_FRONT_RIGHT = 0x0080_0000;
        const FRONT_LEFT_WIDE = 0x0100_0000;
        const FRONT_RIGHT_WIDE = 0x0200_0000;
        const LEFT_SURROUND = 0x0400_0000;
        const RIGHT_SURROUND = 0x0800_0000;
    }
}

bitflags! {
    /// Preferred/Streaming_Audio_Contexts metadata value: a bitmap of use
    /// cases, per the Bluetooth Assigned Numbers Context_Type table.
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ContextType: u16 {
        const UNSPECIFIED = 0x0001;
        const CONVERSATIONAL = 0x0002;
        const MEDIA = 0x0004;
        const GAME = 0x0008;
        const INSTRUCTIONAL = 0x0010;
        const VOICE_ASSISTANTS = 0x0020;
        const LIVE = 0x0040;
        const SOUND_EFFECTS = 0x0080;
    }
}

/// Sampling_Frequency codec-specific-configuration value. `0..=12` cover
/// the named rates; anything else is Reserved For Use.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum SamplingFrequency {
    #[default]
    Hz8000 = 0,
    Hz16000 = 1,
    Hz24000 = 2,
    Hz32000 = 3,
    Hz44100 = 4,
    Hz48000 = 5,
    Hz88200 = 6,
    Hz96000 = 7,
    Hz176400 = 8,
    Hz192000 = 9,
    Hz384000 = 10,
    Hz22050 = 11,
    Hz11025 = 12,
}

impl SamplingFrequency {
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => Self::Hz8000,
            1 => Self::Hz16000,
            2 => Self::Hz24000,
            3 => Self::Hz32000,
            4 => Self::Hz44100,
            5 => Self::Hz48000,
            6 => Self::Hz88200,
            7 => Self::Hz96000,
            8 => Self::Hz176400,
            9 => Self::Hz192000,
            10 => Self::Hz384000,
            11 => Self::Hz22050,
            12 => Self::Hz11025,
            _ => return None,
        })
    }
}

/// Frame_Duration codec-specific-configuration value.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum FrameDuration {
    Duration7_5Ms = 0,
    #[default]
    Duration10Ms = 1,
}

impl FrameDuration {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Duration7_5Ms),
            1 => Some(Self::Duration10Ms),
            _ => None,
        }
    }
}
