//! Human-facing reference codes (order numbers, lot numbers).

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// `<PREFIX>-<base36 epoch millis>-<random base36 suffix>`, e.g. `PO-M5X2K1QZ-7F3A`.
#[derive(Debug, Copy, Clone)]
pub struct ReferenceCode {
    prefix: &'static str,
    suffix_len: usize,
}

impl ReferenceCode {
    pub const ORDER: ReferenceCode = ReferenceCode {
        prefix: "PO",
        suffix_len: 4,
    };

    pub const LOT: ReferenceCode = ReferenceCode {
        prefix: "LOT",
        suffix_len: 3,
    };

    pub fn generate(&self, at: DateTime<Utc>) -> String {
        let millis = u128::try_from(at.timestamp_millis()).unwrap_or_default();
        let entropy = u128::from_le_bytes(*Uuid::new_v4().as_bytes());
        let mut suffix = base36(entropy);
        suffix.truncate(self.suffix_len);
        format!("{}-{}-{}", self.prefix, base36(millis), suffix)
    }
}

fn base36(mut n: u128) -> String {
    const DIGITS: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn codes_carry_prefix_and_timestamp() {
        let at = Utc.timestamp_millis_opt(36 * 36).unwrap();
        let code = ReferenceCode::LOT.generate(at);
        let parts: Vec<&str> = code.split('-').collect();
        assert_eq!(parts[0], "LOT");
        assert_eq!(parts[1], "100");
        assert_eq!(parts[2].len(), 3);
    }

    #[test]
    fn base36_of_zero() {
        assert_eq!(base36(0), "0");
        assert_eq!(base36(35), "Z");
    }
}
