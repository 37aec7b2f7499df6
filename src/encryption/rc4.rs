//! RC4 stream cipher
//!
//! The symmetric cipher used by revisions 2 and 3 of the standard security
//! handler. Encryption and decryption are the same operation.

/// RC4 cipher state.
pub struct Rc4 {
    s: [u8; 256],
    i: usize,
    j: usize,
}

impl Rc4 {
    /// Key-schedule a new cipher. Keys are 1 to 256 bytes.
    pub fn new(key: &[u8]) -> Self {
        debug_assert!(!key.is_empty());
        let mut s = [0u8; 256];
        for (i, byte) in s.iter_mut().enumerate() {
            *byte = i as u8;
        }
        let mut j = 0usize;
        for i in 0..256 {
            j = (j + s[i] as usize + key[i % key.len()] as usize) % 256;
            s.swap(i, j);
        }
        Self { s, i: 0, j: 0 }
    }

    /// XOR the keystream over `data` in place.
    pub fn apply_in_place(&mut self, data: &mut [u8]) {
        for byte in data.iter_mut() {
            self.i = (self.i + 1) % 256;
            self.j = (self.j + self.s[self.i] as usize) % 256;
            self.s.swap(self.i, self.j);
            let k = self.s[(self.s[self.i] as usize + self.s[self.j] as usize) % 256];
            *byte ^= k;
        }
    }

    /// Convenience: process `data` with a fresh cipher keyed by `key`.
    pub fn process(key: &[u8], data: &[u8]) -> Vec<u8> {
        let mut out = data.to_vec();
        Rc4::new(key).apply_in_place(&mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_keystream() {
        // RFC 6229 test vector, key 0x0102030405
        let key = [0x01, 0x02, 0x03, 0x04, 0x05];
        let keystream = Rc4::process(&key, &[0u8; 16]);
        assert_eq!(
            keystream,
            [
                0xb2, 0x39, 0x63, 0x05, 0xf0, 0x3d, 0xc0, 0x27, 0xcc, 0xc3, 0x52, 0x4a, 0x0a,
                0x11, 0x18, 0xa8
            ]
        );
    }

    #[test]
    fn test_round_trip() {
        let key = b"secret";
        let plaintext = b"The quick brown fox jumps over the lazy dog";
        let ciphertext = Rc4::process(key, plaintext);
        assert_ne!(&ciphertext[..], &plaintext[..]);
        assert_eq!(Rc4::process(key, &ciphertext), plaintext);
    }

    #[test]
    fn test_in_place_matches_process() {
        let key = [0xAA, 0xBB, 0xCC];
        let mut data = b"payload bytes".to_vec();
        let expected = Rc4::process(&key, &data);
        Rc4::new(&key).apply_in_place(&mut data);
        assert_eq!(data, expected);
    }

    #[test]
    fn test_keystream_continues_across_calls() {
        let key = [0x01, 0x02, 0x03, 0x04, 0x05];
        let mut split = [0u8; 16];
        let mut cipher = Rc4::new(&key);
        cipher.apply_in_place(&mut split[..8]);
        cipher.apply_in_place(&mut split[8..]);
        assert_eq!(split.to_vec(), Rc4::process(&key, &[0u8; 16]));
    }
}
