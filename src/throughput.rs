use std::sync::LazyLock;

use regex::Regex;

/// Matches the load-phase report of the benchmark binary, e.g.
/// ```text
/// Throughput: load, 1234567.89 ,ops/s
/// ```
static THROUGHPUT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Throughput: load, (\S+) ,ops/s").unwrap());

/// Return the throughput of the first line reporting one.
///
/// Lines after the first match are not looked at, even when the number on
/// the matching line does not parse.
pub fn parse_throughput(output: &str) -> Option<f64> {
    let captures = output
        .lines()
        .find_map(|line| THROUGHPUT_RE.captures(line))?;
    captures[1].parse::<f64>().ok()
}
