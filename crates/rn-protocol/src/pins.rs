//! Digital pins addressable with `sys set pindig`

use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;

/// A module pin that can be driven as a digital output
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PinName {
    Gpio0,
    Gpio1,
    Gpio2,
    Gpio3,
    Gpio4,
    Gpio5,
    Gpio6,
    Gpio7,
    Gpio8,
    Gpio9,
    Gpio10,
    Gpio11,
    Gpio12,
    Gpio13,
    UartCts,
    UartRts,
    Test0,
    Test1,
}

impl PinName {
    /// Every pin, in datasheet order
    pub const ALL: [PinName; 18] = [
        PinName::Gpio0,
        PinName::Gpio1,
        PinName::Gpio2,
        PinName::Gpio3,
        PinName::Gpio4,
        PinName::Gpio5,
        PinName::Gpio6,
        PinName::Gpio7,
        PinName::Gpio8,
        PinName::Gpio9,
        PinName::Gpio10,
        PinName::Gpio11,
        PinName::Gpio12,
        PinName::Gpio13,
        PinName::UartCts,
        PinName::UartRts,
        PinName::Test0,
        PinName::Test1,
    ];

    /// Name as written on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            PinName::Gpio0 => "GPIO0",
            PinName::Gpio1 => "GPIO1",
            PinName::Gpio2 => "GPIO2",
            PinName::Gpio3 => "GPIO3",
            PinName::Gpio4 => "GPIO4",
            PinName::Gpio5 => "GPIO5",
            PinName::Gpio6 => "GPIO6",
            PinName::Gpio7 => "GPIO7",
            PinName::Gpio8 => "GPIO8",
            PinName::Gpio9 => "GPIO9",
            PinName::Gpio10 => "GPIO10",
            PinName::Gpio11 => "GPIO11",
            PinName::Gpio12 => "GPIO12",
            PinName::Gpio13 => "GPIO13",
            PinName::UartCts => "UART_CTS",
            PinName::UartRts => "UART_RTS",
            PinName::Test0 => "TEST0",
            PinName::Test1 => "TEST1",
        }
    }
}

impl fmt::Display for PinName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PinName {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PinName::ALL
            .iter()
            .copied()
            .find(|pin| pin.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseError::UnknownPin(s.to_string()))
    }
}
