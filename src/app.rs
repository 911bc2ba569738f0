use clap::Arg;

pub struct App {
    input_path: Option<String>,
    output_path: Option<String>,
    json_path: Option<String>,
    conf_path: String,
    wallet: Option<String>,
    method: Option<String>,
    region: Option<String>,
    clear_cache: bool,
}

impl App {
    pub fn new() -> App {
        let matches = clap::App::new("solana-tax")
            .version(env!("CARGO_PKG_VERSION"))
            .about("Reconstructs a Solana wallet's swaps into a capital gains statement")
            .arg(Arg::with_name("input_path")
                .short("i")
                .long("input")
                .takes_value(true)
                .help("JSON file of enhanced transactions (fetched from Helius if omitted)"))
            .arg(Arg::with_name("output_path")
                .short("o")
                .long("output")
                .takes_value(true)
                .help("CSV file for the taxable event log"))
            .arg(Arg::with_name("json_path")
                .long("json")
                .takes_value(true)
                .help("JSON file for the full report"))
            .arg(Arg::with_name("config_path")
                .short("c")
                .long("config")
                .takes_value(true)
                .help("Config file"))
            .arg(Arg::with_name("wallet")
                .short("w")
                .long("wallet")
                .takes_value(true)
                .help("Wallet address, overrides the config file"))
            .arg(Arg::with_name("method")
                .long("method")
                .takes_value(true)
                .possible_values(&["FIFO", "LIFO", "fifo", "lifo"])
                .help("Lot accounting method"))
            .arg(Arg::with_name("region")
                .long("region")
                .takes_value(true)
                .help("Tax region id, e.g. us_federal, uk, germany"))
            .arg(Arg::with_name("clear")
                .long("clear")
                .takes_value(false)
                .help("Clears the price cache"))
            .get_matches();

        App {
            input_path: matches.value_of("input_path").map(String::from),
            output_path: matches.value_of("output_path").map(String::from),
            json_path: matches.value_of("json_path").map(String::from),
            conf_path: matches.value_of("config_path")
                .unwrap_or("config.yaml")
                .to_string(),
            wallet: matches.value_of("wallet").map(String::from),
            method: matches.value_of("method").map(String::from),
            region: matches.value_of("region").map(String::from),
            clear_cache: matches.is_present("clear"),
        }
    }

    pub fn get_config_path(&self) -> &str { &self.conf_path }
    pub fn get_input_path(&self) -> Option<&str> { self.input_path.as_deref() }
    pub fn get_output_path(&self) -> Option<&str> { self.output_path.as_deref() }
    pub fn get_json_path(&self) -> Option<&str> { self.json_path.as_deref() }
    pub fn get_wallet(&self) -> Option<&str> { self.wallet.as_deref() }
    pub fn get_method(&self) -> Option<&str> { self.method.as_deref() }
    pub fn get_region(&self) -> Option<&str> { self.region.as_deref() }
    pub fn get_clear_cache(&self) -> bool { self.clear_cache }
}
