const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];

/// Human readable size, used when logging store geometry.
pub fn pretty_size_from_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{} B", bytes);
    }

    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", value, UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::pretty_size_from_bytes;

    #[test]
    fn sizes() {
        assert_eq!(pretty_size_from_bytes(512), "512 B");
        assert_eq!(pretty_size_from_bytes(116_736), "114.00 KB");
        assert_eq!(pretty_size_from_bytes(16 * 1024 * 1024), "16.00 MB");
        assert_eq!(pretty_size_from_bytes(3 << 40), "3.00 TB");
        assert_eq!(pretty_size_from_bytes(5 << 50), "5120.00 TB");
    }
}
