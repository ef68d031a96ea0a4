use std::time::Instant;

const HEX: &[u8; 16] = b"0123456789abcdef";
const MESSAGE_ID_PREFIX: &str = "msg_";

/// Generate a fresh Anthropic-style message id (`msg_` + 32 lowercase hex digits).
#[must_use]
pub(crate) fn next_message_id() -> String {
    let seed_hi = u128::from(fastrand::u64(..));
    let seed_lo = u128::from(fastrand::u64(..));
    let id = uuid::Uuid::from_u128((seed_hi << 64) | seed_lo);
    let mut out = String::with_capacity(MESSAGE_ID_PREFIX.len() + 32);
    out.push_str(MESSAGE_ID_PREFIX);
    out.push_str(id.simple().encode_lower(&mut uuid::Uuid::encode_buffer()));
    out
}

#[inline]
pub(crate) fn elapsed_secs_f64(start: Instant) -> f64 {
    start.elapsed().as_secs_f64()
}

#[inline]
pub(crate) fn push_json_string_escaped(out: &mut String, value: &str) {
    let bytes = value.as_bytes();
    if bytes.iter().all(|&b| b >= 0x20 && b != b'"' && b != b'\\') {
        out.push('"');
        out.push_str(value);
        out.push('"');
        return;
    }

    out.push('"');
    for ch in value.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            c if c <= '\u{1f}' => {
                let control = c as u8;
                out.push_str("\\u00");
                out.push(char::from(HEX[(control >> 4) as usize]));
                out.push(char::from(HEX[(control & 0x0f) as usize]));
            }
            _ => out.push(ch),
        }
    }
    out.push('"');
}

#[inline]
pub(crate) fn push_u64_decimal(out: &mut String, mut n: u64) {
    if n == 0 {
        out.push('0');
        return;
    }

    let mut buf = [0u8; 20];
    let mut i = buf.len();
    while n > 0 {
        i -= 1;
        buf[i] = b'0' + ((n % 10) as u8);
        n /= 10;
    }
    let digits = std::str::from_utf8(&buf[i..]).unwrap_or("0");
    out.push_str(digits);
}

#[inline]
pub(crate) fn push_usize_decimal(out: &mut String, n: usize) {
    push_u64_decimal(out, n as u64);
}
