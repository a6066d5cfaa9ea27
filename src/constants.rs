pub mod limits {

    pub const MAX_CLI_RESULTS: usize = 10;

    pub const DEFAULT_TRENDING_LIMIT: u64 = 5;

    pub const DEFAULT_SESSION_IDLE_SECONDS: u64 = 30 * 60;
}

pub mod intervals {
    use std::time::Duration;

    /// How often the session registry looks for idle sessions.
    pub const SESSION_SWEEP: Duration = Duration::from_secs(60);
}
