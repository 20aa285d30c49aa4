use bytesize::ByteSize;

/// Binary units (`KiB`, `MiB`, ...). bytesize 1.x spells the kilo step `kiB`.
pub fn human_bytes(b: u64) -> String {
    ByteSize::b(b).to_string_as(true).replacen("kiB", "KiB", 1)
}

/// `used / total (pct%)`, as shown next to the usage bar.
pub fn usage_line(used: u64, total: u64) -> String {
    let pct = if total == 0 {
        0.0
    } else {
        used as f64 * 100.0 / total as f64
    };
    format!("{} / {} ({pct:.1}%)", human_bytes(used), human_bytes(total))
}
