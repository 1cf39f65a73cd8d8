use getopts::Options;

pub const DEFAULT_AGGREGATOR_URL: &str = "http://localhost:5001";

pub fn dash_opts() -> Options {
    let mut opts = Options::new();
    opts.optopt(
        "u",
        "url",
        &format!("aggregator base url (default {})", DEFAULT_AGGREGATOR_URL),
        "url",
    );
    opts
}

pub fn dash_parseopts(opts: &Options, args: &[String]) -> (getopts::Matches, String) {
    let matches = match opts.parse(&args[1..]) {
        Ok(m) => m,
        Err(f) => {
            panic!("{}", f.to_string())
        }
    };
    let url = if let Some(url) = matches.opt_str("u") {
        url
    } else {
        DEFAULT_AGGREGATOR_URL.to_string()
    };
    (matches, url)
}
