//! Configuration template generation

use std::fs;
use std::path::Path;

const TEMPLATE: &str = r#"# finsent configuration
# Every key is optional; missing keys take the values shown here.
# Environment overrides: FINSENT_SIDECAR_URL, FINSENT_DATA_DIR, FINSENT_LAG_MINUTES

[exchange]
# IANA timezone of the exchange
timezone = "America/New_York"

# Regular session in exchange-local time (HH:MM)
open = "09:30"
close = "16:00"

# Minutes between publication and the time a headline can move the market.
# Arrivals before the open count for that day; anything later counts for the
# next business day.
lag_minutes = 30

[scorer]
# "lexicon" (offline word lists) or "sidecar" (HTTP model server)
backend = "lexicon"

# Sidecar base URL; must serve GET /labels and POST /score
endpoint = "http://127.0.0.1:8000"

# Texts per request and requests in flight
batch_size = 16
concurrency = 4

# Per-request timeout in seconds and retries on transient failures
timeout_secs = 30
max_retries = 2

[labels]
# Labels outside negative/neutral/positive in scored files:
# "reject" fails the run, "neutral" counts them as polarity 0
unknown_policy = "reject"

[prices]
# "csv" (local file) or "remote" (chart API)
source = "csv"

# Daily bars with date,open,high,low,close[,adj_close],volume
# csv_path = "data/raw/prices_AAPL.csv"

# Chart API base URL for the remote source
endpoint = "https://query1.finance.yahoo.com"

# Days of prices fetched beyond the first and last feature date
padding_days = 5

# Evaluate on adj_close instead of close
prefer_adj_close = true

# Cache downloaded prices in the intermediate directory
cache = true

[data]
raw_dir = "data/raw"
intermediate_dir = "data/intermediate"
"#;

/// Generate a configuration file with comments explaining each field
pub fn generate_commented_config_template<P: AsRef<Path>>(path: P) -> std::io::Result<()> {
    if let Some(parent) = path.as_ref().parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    fs::write(path, TEMPLATE)?;
    Ok(())
}
