//! User non-volatile memory layout

/// First addressable byte of user NVM
pub const USER_NVM_START: u16 = 0x300;

/// Last addressable byte of user NVM
pub const USER_NVM_END: u16 = 0x3FF;

/// Number of addressable bytes of user NVM
pub const USER_NVM_LENGTH: u16 = USER_NVM_END + 1 - USER_NVM_START;

/// Offset of `address` into user NVM, or `None` if it is out of range
pub fn user_nvm_index(address: u16) -> Option<usize> {
    (USER_NVM_START..=USER_NVM_END)
        .contains(&address)
        .then(|| usize::from(address - USER_NVM_START))
}
