use std::time::{Duration, SystemTime};

pub trait ByteSerializable {
    fn to_bytes(&self) -> Vec<u8>;
    fn from_bytes(bytes: &[u8]) -> Self;
}

pub trait KnownSize: ByteSerializable {
    fn size_on_disk() -> usize;
}

pub(crate) fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    let mut buffer = [0u8; 4];
    buffer.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_le_bytes(buffer)
}

pub(crate) fn read_u64(bytes: &[u8], offset: usize) -> u64 {
    let mut buffer = [0u8; 8];
    buffer.copy_from_slice(&bytes[offset..offset + 8]);
    u64::from_le_bytes(buffer)
}

// Seconds and nanoseconds since the epoch; times before it clamp to the epoch.
impl ByteSerializable for SystemTime {
    fn to_bytes(&self) -> Vec<u8> {
        let since_unix = self.duration_since(SystemTime::UNIX_EPOCH).unwrap_or(Duration::ZERO);
        let mut result = Vec::<u8>::with_capacity(Self::size_on_disk());
        result.extend_from_slice(&since_unix.as_secs().to_le_bytes());
        result.extend_from_slice(&since_unix.subsec_nanos().to_le_bytes());
        result
    }

    fn from_bytes(bytes: &[u8]) -> Self {
        let seconds = read_u64(bytes, 0);
        let nanos = read_u32(bytes, 8).min(999_999_999);
        SystemTime::UNIX_EPOCH + Duration::new(seconds, nanos)
    }
}

impl KnownSize for SystemTime {
    fn size_on_disk() -> usize {
        12
    }
}
