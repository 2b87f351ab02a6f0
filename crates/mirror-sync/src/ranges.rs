/// Split `[from, to]` into inclusive windows of at most `batch_size` blocks
pub fn block_windows(from: u64, to: u64, batch_size: u64) -> Vec<(u64, u64)> {
    let batch_size = batch_size.max(1);
    let mut windows = Vec::new();
    let mut current = from;
    while current <= to {
        let end = current.saturating_add(batch_size - 1).min(to);
        windows.push((current, end));
        if end == u64::MAX {
            break;
        }
        current = end + 1;
    }
    windows
}
