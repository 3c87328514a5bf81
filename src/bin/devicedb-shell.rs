//! The devicedb-shell executable supports the following command line arguments:
//!
//! `devicedb-shell --uri URI [--rootCA FILE] [--cluster] [--verbose]`
//!
//!     Open an interactive shell on the DeviceDB node at URI.
//!     --rootCA trusts the PEM certificates in FILE when connecting over https.
//!     --cluster talks to a DeviceDB cluster instead of a node; --uri may then be given several
//!     times and every request goes to one of the URIs at random.
//!     Print an error and exit with code 1 if no URI is given, a URI does not parse, or FILE
//!     cannot be read.
//!
//! Type `help` at the prompt for the list of shell commands.

use std::io;
use std::process::exit;

use clap::{crate_version, App, Arg, ArgMatches};
use devicedb::shell::{Shell, Target};
use devicedb::{ClientConfig, ClusterClient, DeviceDbClient};
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

const NO_URI: &str = "No uri specified";
const INVALID_URI: &str = "Invalid uri specified";
const INVALID_ROOT_CA: &str = "Invalid root CA file specified";
const CLIENT_FAILED: &str = "Could not create client";

/// ['Opt'] holds parsed options from the command line
#[derive(Debug)]
struct Opt {
    uris: Vec<String>,
    root_ca: Option<String>,
    cluster: bool,
}

impl Opt {
    /// reads the options out of `matches`
    /// # Errors
    /// returns the message to print if no `--uri` was given
    fn build(matches: &ArgMatches) -> Result<Opt, &'static str> {
        let uris: Vec<String> = matches
            .values_of("uri")
            .map(|values| values.map(String::from).collect())
            .unwrap_or_default();
        if uris.is_empty() {
            return Err(NO_URI);
        }

        Ok(Opt {
            uris,
            root_ca: matches.value_of("rootCA").map(String::from),
            cluster: matches.is_present("cluster"),
        })
    }
}

fn main() {
    let matches = App::new("devicedb-shell")
        .version(crate_version!())
        .author("strohs <strohs1@gmail.com>")
        .about("an interactive shell for DeviceDB")
        .arg(Arg::with_name("uri")
            .long("uri")
            .value_name("URI")
            .help("the URI of the DeviceDB node, or of a cluster node with --cluster")
            .takes_value(true)
            .multiple(true)
            .number_of_values(1))
        .arg(Arg::with_name("rootCA")
            .long("rootCA")
            .value_name("FILE")
            .help("a PEM file of root certificates to trust")
            .takes_value(true))
        .arg(Arg::with_name("cluster")
            .long("cluster")
            .help("connect to a DeviceDB cluster instead of a single node"))
        .arg(Arg::with_name("verbose")
            .long("verbose")
            .short("v")
            .help("log every request to STDERR"))
        .get_matches();

    // set up a tracing subscriber to log to STDERR
    subscriber_config(if matches.is_present("verbose") { Level::DEBUG } else { Level::WARN });

    let target = match Opt::build(&matches).and_then(|opt| connect(&opt)) {
        Ok(target) => target,
        Err(msg) => {
            println!("{}", msg);
            exit(1);
        }
    };

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut shell = Shell::new(target, stdout.lock());
    if let Err(e) = shell.run(stdin.lock()) {
        eprintln!("{:?}", e);
        exit(1);
    }
}

/// builds the client configuration and the node or cluster client the shell talks to
fn connect(opt: &Opt) -> Result<Target, &'static str> {
    let config = if opt.cluster {
        ClientConfig::cluster(&opt.uris)
    } else if opt.uris.len() == 1 {
        ClientConfig::new(&opt.uris[0])
    } else {
        debug!("several uris given without --cluster: {:?}", opt.uris);
        return Err(INVALID_URI);
    };
    let mut config = config.map_err(|e| {
        debug!("{}", e);
        INVALID_URI
    })?;

    if let Some(path) = &opt.root_ca {
        config = config.with_root_ca_file(path).map_err(|e| {
            debug!("{}: {}", path, e);
            INVALID_ROOT_CA
        })?;
    }

    let target = if opt.cluster {
        ClusterClient::new(config).map(Target::Cluster)
    } else {
        DeviceDbClient::new(config).map(Target::Node)
    };
    target.map_err(|e| {
        debug!("{}", e);
        CLIENT_FAILED
    })
}

/// configures a tracing subscriber that will log to STDERR
fn subscriber_config(level: Level) {
    let subscriber = FmtSubscriber::builder()
        // all spans/events with a level higher than `level` will be written
        .with_max_level(level)
        // log to stderr so the shell output stays clean
        .with_writer(std::io::stderr)
        // completes the builder.
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("setting tracing default subscriber failed");
}
