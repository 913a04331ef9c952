//! Access-code table and the behavior each code implies for a bit.
//!
//! All 28 codes are recognized. Only `ro`, `wo`, `worz`, `w1c`, `wc`, `ws`
//! and the default `rw` change runtime behavior; every other code is accepted
//! and behaves as `rw`.

use std::fmt;
use std::str::FromStr;

use crate::RegisterError;

/// Access code attached to a bit or field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[allow(missing_docs)]
pub enum AccessCode {
    Ro,
    #[default]
    Rw,
    Rc,
    Rs,
    Wrc,
    Wrs,
    Wc,
    Ws,
    Wsrc,
    Wcrs,
    W1c,
    W1s,
    W1t,
    W0c,
    W0s,
    W0t,
    W1src,
    W1crs,
    W0src,
    W0crs,
    Wo,
    Woc,
    Worz,
    Wos,
    W1,
    Wo1,
    Dc,
    Rowz,
}

/// Read/write behavior derived from an access code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AccessBehavior {
    /// Bit participates in read transactions.
    pub readable: bool,
    /// Bit accepts non-forced writes.
    pub writable: bool,
    /// Writing one clears the bit in hardware.
    pub w1c: bool,
    /// Writes may only move the bit from 1 to 0.
    pub clr_only: bool,
    /// Writes may only move the bit from 0 to 1.
    pub set_only: bool,
}

impl AccessBehavior {
    /// Plain read-write behavior.
    pub const READ_WRITE: Self = Self {
        readable: true,
        writable: true,
        w1c: false,
        clr_only: false,
        set_only: false,
    };
}

impl AccessCode {
    /// Every recognized access code in table order.
    pub const ALL: [Self; 28] = [
        Self::Ro,
        Self::Rw,
        Self::Rc,
        Self::Rs,
        Self::Wrc,
        Self::Wrs,
        Self::Wc,
        Self::Ws,
        Self::Wsrc,
        Self::Wcrs,
        Self::W1c,
        Self::W1s,
        Self::W1t,
        Self::W0c,
        Self::W0s,
        Self::W0t,
        Self::W1src,
        Self::W1crs,
        Self::W0src,
        Self::W0crs,
        Self::Wo,
        Self::Woc,
        Self::Worz,
        Self::Wos,
        Self::W1,
        Self::Wo1,
        Self::Dc,
        Self::Rowz,
    ];

    /// Short lowercase mnemonic, as written in register descriptions.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ro => "ro",
            Self::Rw => "rw",
            Self::Rc => "rc",
            Self::Rs => "rs",
            Self::Wrc => "wrc",
            Self::Wrs => "wrs",
            Self::Wc => "wc",
            Self::Ws => "ws",
            Self::Wsrc => "wsrc",
            Self::Wcrs => "wcrs",
            Self::W1c => "w1c",
            Self::W1s => "w1s",
            Self::W1t => "w1t",
            Self::W0c => "w0c",
            Self::W0s => "w0s",
            Self::W0t => "w0t",
            Self::W1src => "w1src",
            Self::W1crs => "w1crs",
            Self::W0src => "w0src",
            Self::W0crs => "w0crs",
            Self::Wo => "wo",
            Self::Woc => "woc",
            Self::Worz => "worz",
            Self::Wos => "wos",
            Self::W1 => "w1",
            Self::Wo1 => "wo1",
            Self::Dc => "dc",
            Self::Rowz => "rowz",
        }
    }

    /// Human-readable description of the hardware behavior the code names.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Ro => "Read-Only: write has no effect",
            Self::Rw => "Read-Write",
            Self::Rc => "Read-Only, Clear-on-Read",
            Self::Rs => "Read-Only, Set-on-Read",
            Self::Wrc => "Read-Write, Clear-on-Read",
            Self::Wrs => "Read-Write, Set-on-Read",
            Self::Wc => "Write-Clear",
            Self::Ws => "Write-Set",
            Self::Wsrc => "Write-Set, Clear-on-Read",
            Self::Wcrs => "Write-Clear, Set-on-Read",
            Self::W1c => "Write-1-to-Clear",
            Self::W1s => "Write-1-to-Set",
            Self::W1t => "Write-1-to-Toggle",
            Self::W0c => "Write-0-to-Clear",
            Self::W0s => "Write-0-to-Set",
            Self::W0t => "Write-0-to-Toggle",
            Self::W1src => "Write-1-to-Set, Clear-on-Read",
            Self::W1crs => "Write-1-to-Clear, Set-on-Read",
            Self::W0src => "Write-0-to-Set, Clear-on-Read",
            Self::W0crs => "Write-0-to-Clear, Set-on-Read",
            Self::Wo => "Write-Only",
            Self::Woc => "Write-Only, Clear",
            Self::Worz => "Write-Only, Read-Zero",
            Self::Wos => "Write-Only, Set",
            Self::W1 => "Write-Once",
            Self::Wo1 => "Write-Only, Write-Once",
            Self::Dc => "Read-Write, not checked on read",
            Self::Rowz => "Read-Only, Write-Zero",
        }
    }

    /// Derives bit behavior flags from this code.
    #[must_use]
    pub const fn behavior(self) -> AccessBehavior {
        match self {
            Self::Ro => AccessBehavior {
                writable: false,
                ..AccessBehavior::READ_WRITE
            },
            Self::Wo | Self::Worz => AccessBehavior {
                readable: false,
                ..AccessBehavior::READ_WRITE
            },
            Self::W1c => AccessBehavior {
                w1c: true,
                ..AccessBehavior::READ_WRITE
            },
            Self::Wc => AccessBehavior {
                clr_only: true,
                ..AccessBehavior::READ_WRITE
            },
            Self::Ws => AccessBehavior {
                set_only: true,
                ..AccessBehavior::READ_WRITE
            },
            _ => AccessBehavior::READ_WRITE,
        }
    }

    /// Returns `true` when the code changes runtime behavior beyond `rw`.
    #[must_use]
    pub const fn is_behaviorally_implemented(self) -> bool {
        matches!(
            self,
            Self::Ro | Self::Rw | Self::Wo | Self::Worz | Self::W1c | Self::Wc | Self::Ws
        )
    }
}

impl fmt::Display for AccessCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessCode {
    type Err = RegisterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|code| code.as_str() == wanted)
            .ok_or_else(|| RegisterError::UnknownAccessCode(s.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{AccessBehavior, AccessCode};
    use crate::RegisterError;

    #[rstest]
    #[case::read_only(AccessCode::Ro, true, false)]
    #[case::read_write(AccessCode::Rw, true, true)]
    #[case::write_only(AccessCode::Wo, false, true)]
    #[case::write_only_read_zero(AccessCode::Worz, false, true)]
    #[case::write_one_clear(AccessCode::W1c, true, true)]
    #[case::write_clear(AccessCode::Wc, true, true)]
    #[case::write_set(AccessCode::Ws, true, true)]
    fn implemented_codes_set_read_write_flags(
        #[case] code: AccessCode,
        #[case] readable: bool,
        #[case] writable: bool,
    ) {
        let behavior = code.behavior();
        assert_eq!(behavior.readable, readable);
        assert_eq!(behavior.writable, writable);
        assert!(code.is_behaviorally_implemented());
    }

    #[test]
    fn only_dedicated_codes_set_special_write_flags() {
        assert!(AccessCode::W1c.behavior().w1c);
        assert!(AccessCode::Wc.behavior().clr_only);
        assert!(AccessCode::Ws.behavior().set_only);
        assert!(!AccessCode::W1s.behavior().set_only);
        assert!(!AccessCode::W0c.behavior().clr_only);
    }

    #[test]
    fn unimplemented_codes_degrade_to_read_write() {
        let degraded: Vec<_> = AccessCode::ALL
            .iter()
            .copied()
            .filter(|code| !code.is_behaviorally_implemented())
            .collect();

        assert_eq!(degraded.len(), 21);
        for code in degraded {
            assert_eq!(code.behavior(), AccessBehavior::READ_WRITE, "{code}");
        }
    }

    #[test]
    fn mnemonic_parse_is_case_insensitive_and_total() {
        for code in AccessCode::ALL {
            assert_eq!(code.as_str().parse::<AccessCode>(), Ok(code));
            assert_eq!(code.as_str().to_uppercase().parse::<AccessCode>(), Ok(code));
        }
    }

    #[test]
    fn unknown_mnemonic_is_rejected() {
        assert_eq!(
            "rwx".parse::<AccessCode>(),
            Err(RegisterError::UnknownAccessCode("rwx".to_owned()))
        );
    }
}
