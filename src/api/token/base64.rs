//! URL-safe base64 without padding, the flavour compact tokens use.

const ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

pub fn encode(input: &[u8]) -> String {
    let mut out = String::with_capacity((input.len() + 2) / 3 * 4);
    for chunk in input.chunks(3) {
        let mut acc = 0u32;
        for (i, &byte) in chunk.iter().enumerate() {
            acc |= (byte as u32) << (16 - 8 * i);
        }
        // n input bytes become n+1 sextets.
        for i in 0..=chunk.len() {
            let index = ((acc >> (18 - 6 * i)) & 0x3f) as usize;
            out.push(ALPHABET[index] as char);
        }
    }
    out
}

pub fn decode(input: &str) -> Option<Vec<u8>> {
    let bytes = input.as_bytes();
    if bytes.len() % 4 == 1 {
        return None;
    }

    let mut out = Vec::with_capacity(bytes.len() / 4 * 3 + 2);
    for chunk in bytes.chunks(4) {
        let mut acc = 0u32;
        for (i, &c) in chunk.iter().enumerate() {
            acc |= (decode_char(c)? as u32) << (18 - 6 * i);
        }
        for i in 0..chunk.len() - 1 {
            out.push((acc >> (16 - 8 * i)) as u8);
        }
    }
    Some(out)
}

fn decode_char(c: u8) -> Option<u8> {
    match c {
        b'A'..=b'Z' => Some(c - b'A'),
        b'a'..=b'z' => Some(c - b'a' + 26),
        b'0'..=b'9' => Some(c - b'0' + 52),
        b'-' => Some(62),
        b'_' => Some(63),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_encode_known_vectors() {
        assert_eq!(encode(b""), "");
        assert_eq!(encode(b"f"), "Zg");
        assert_eq!(encode(b"fo"), "Zm8");
        assert_eq!(encode(b"foo"), "Zm9v");
        assert_eq!(encode(b"hello world"), "aGVsbG8gd29ybGQ");
    }

    #[test]
    fn should_decode_known_vectors() {
        assert_eq!(decode("Zm9v").unwrap(), b"foo");
        assert_eq!(decode("aGVsbG8gd29ybGQ").unwrap(), b"hello world");
        assert_eq!(decode("").unwrap(), b"");
    }

    #[test]
    fn should_round_trip_every_length_remainder() {
        for len in 0..16usize {
            let data: Vec<u8> = (0..len as u8).collect();
            assert_eq!(decode(&encode(&data)).unwrap(), data);
        }
    }

    #[test]
    fn should_reject_invalid_input() {
        assert_eq!(decode("!!!"), None);
        // A single trailing sextet cannot carry a whole byte.
        assert_eq!(decode("AAAAA"), None);
    }
}
