//! Card capabilities data object (ISO/IEC 7816-4 §8.1.1.2.7)
//!
//! The object carries a function table of one to three bytes: selection
//! methods, data coding byte and command coding byte. Views for bytes that are
//! absent are `None`, and callers must then assume the conservative defaults
//! (no chaining, no extended length).

use crate::tlv::{Tlv, TlvSliceExt, compact};

/// Compact tag number of the card capabilities object
pub const CARD_CAPABILITIES_TAG: u8 = 7;

#[inline]
const fn bit(byte: u8, index: u8) -> bool {
    byte & (1 << index) != 0
}

/// First software function table byte: supported selection methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionMethods(u8);

impl SelectionMethods {
    /// Raw function table byte
    pub const fn byte(&self) -> u8 {
        self.0
    }

    /// DF selection by full DF name
    pub const fn select_df_by_full_name(&self) -> bool {
        bit(self.0, 7)
    }

    /// DF selection by partial DF name
    pub const fn select_df_by_partial_name(&self) -> bool {
        bit(self.0, 6)
    }

    /// DF selection by path
    pub const fn select_df_by_path(&self) -> bool {
        bit(self.0, 5)
    }

    /// DF selection by file identifier
    pub const fn select_df_by_file_id(&self) -> bool {
        bit(self.0, 4)
    }

    /// Implicit DF selection
    pub const fn select_df_implicit(&self) -> bool {
        bit(self.0, 3)
    }

    /// Short EF identifier supported
    pub const fn supports_short_ef(&self) -> bool {
        bit(self.0, 2)
    }

    /// Record number supported
    pub const fn supports_record_number(&self) -> bool {
        bit(self.0, 1)
    }

    /// Record identifier supported
    pub const fn supports_record_identifier(&self) -> bool {
        bit(self.0, 0)
    }
}

/// Behaviour of write functions, bits 7 and 6 of the data coding byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteBehaviour {
    /// One-time write
    OneTime,
    /// Proprietary
    Proprietary,
    /// Write OR
    Or,
    /// Write AND
    And,
}

/// Second software function table byte: data coding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataCoding(u8);

impl DataCoding {
    /// Raw function table byte
    pub const fn byte(&self) -> u8 {
        self.0
    }

    /// EFs of TLV structure supported
    pub const fn tlv_efs(&self) -> bool {
        bit(self.0, 7)
    }

    /// Behaviour of write functions
    pub const fn write_behaviour(&self) -> WriteBehaviour {
        match (bit(self.0, 6), bit(self.0, 5)) {
            (false, false) => WriteBehaviour::OneTime,
            (false, true) => WriteBehaviour::Proprietary,
            (true, false) => WriteBehaviour::Or,
            (true, true) => WriteBehaviour::And,
        }
    }

    /// Value `FF` is valid as first byte of BER-TLV tag fields
    pub const fn ff_valid_as_tlv_first_byte(&self) -> bool {
        bit(self.0, 4)
    }

    /// Data unit size in quartets
    pub const fn data_unit_quartets(&self) -> u32 {
        1 << (self.0 & 0x0F)
    }

    /// Data unit size in bytes, rounded up
    pub const fn data_unit_bytes(&self) -> u32 {
        self.data_unit_quartets().div_ceil(2)
    }
}

/// Logical channel assignment policy, bits 5 and 4 of the command coding byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalChannelAssignment {
    /// Channel numbers assigned by card and interface device
    Both,
    /// Channel numbers assigned by the card
    ByCard,
    /// Channel numbers assigned by the interface device
    ByInterface,
    /// No logical channels
    None,
}

/// Third software function table byte: command coding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandCoding(u8);

impl CommandCoding {
    /// Raw function table byte
    pub const fn byte(&self) -> u8 {
        self.0
    }

    /// Command chaining supported
    pub const fn supports_command_chaining(&self) -> bool {
        bit(self.0, 7)
    }

    /// Extended Lc and Le fields supported
    pub const fn supports_extended_length(&self) -> bool {
        bit(self.0, 6)
    }

    /// Logical channel assignment
    pub const fn logical_channel_assignment(&self) -> LogicalChannelAssignment {
        match (bit(self.0, 4), bit(self.0, 3)) {
            (true, true) => LogicalChannelAssignment::Both,
            (true, false) => LogicalChannelAssignment::ByCard,
            (false, true) => LogicalChannelAssignment::ByInterface,
            (false, false) => LogicalChannelAssignment::None,
        }
    }

    /// Whether the card supports logical channels at all
    pub const fn supports_logical_channels(&self) -> bool {
        !matches!(
            self.logical_channel_assignment(),
            LogicalChannelAssignment::None
        )
    }

    /// Maximum number of logical channels
    ///
    /// Bits y, z, t (b2..b0) give `4y + z + t + 1`, except that all three
    /// set means "eight or more", reported as 8.
    pub const fn max_logical_channels(&self) -> u8 {
        if !self.supports_logical_channels() {
            return 0;
        }
        let (y, z, t) = (bit(self.0, 2), bit(self.0, 1), bit(self.0, 0));
        if y && z && t {
            8
        } else {
            4 * y as u8 + z as u8 + t as u8 + 1
        }
    }
}

/// Decoded card capabilities
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardCapabilities {
    selection_methods: SelectionMethods,
    data_coding: Option<DataCoding>,
    command_coding: Option<CommandCoding>,
}

impl CardCapabilities {
    /// Decode from the function table bytes, `None` when empty
    pub fn from_function_table(table: &[u8]) -> Option<Self> {
        let (&first, rest) = table.split_first()?;
        Some(Self {
            selection_methods: SelectionMethods(first),
            data_coding: rest.first().copied().map(DataCoding),
            command_coding: rest.get(1).copied().map(CommandCoding),
        })
    }

    /// Locate and decode the capabilities object among compact data objects
    pub fn from_data_objects(objects: &[Tlv]) -> Option<Self> {
        objects
            .find_by_num(compact::tag_num(CARD_CAPABILITIES_TAG))
            .and_then(Tlv::value)
            .and_then(|value| Self::from_function_table(value))
    }

    /// Selection methods, always present
    pub const fn selection_methods(&self) -> SelectionMethods {
        self.selection_methods
    }

    /// Data coding byte if present
    pub const fn data_coding(&self) -> Option<DataCoding> {
        self.data_coding
    }

    /// Command coding byte if present
    pub const fn command_coding(&self) -> Option<CommandCoding> {
        self.command_coding
    }

    /// Command chaining support, false when unknown
    pub const fn supports_command_chaining(&self) -> bool {
        match self.command_coding {
            Some(coding) => coding.supports_command_chaining(),
            None => false,
        }
    }

    /// Extended length support, false when unknown
    pub const fn supports_extended_length(&self) -> bool {
        match self.command_coding {
            Some(coding) => coding.supports_extended_length(),
            None => false,
        }
    }
}
