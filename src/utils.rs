use rand::seq::SliceRandom;

pub const USER_AGENTS: [&str; 3] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 13_5) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Safari/605.1.15",
];

/// Picks one User-Agent from the fixed pool.
pub fn pick_user_agent() -> &'static str {
    let mut rng = rand::thread_rng();
    USER_AGENTS.choose(&mut rng).copied().unwrap_or(USER_AGENTS[0])
}

/// Keeps the first and last six characters of an address, e.g. `0x1234******345678`.
pub fn mask_address(address: &str) -> String {
    let head = address.get(..6).unwrap_or(address);
    let tail = address
        .len()
        .checked_sub(6)
        .and_then(|start| address.get(start..))
        .unwrap_or(address);
    format!("{}******{}", head, tail)
}

/// Formats a second count as `HH:MM:SS`.
pub fn format_hms(total_seconds: u64) -> String {
    let h = total_seconds / 3600;
    let m = (total_seconds % 3600) / 60;
    let s = total_seconds % 60;
    format!("{:02}:{:02}:{:02}", h, m, s)
}
