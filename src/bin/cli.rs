use clap::{App, Arg, SubCommand};
use robomq::{
    arena::{ShmArena, ShmArenaReader},
    error::RobomqError,
    server::Broker,
    store::Order,
    Result,
};
use std::{sync::Arc, thread, time::Duration};

fn main() -> Result<()> {
    env_logger::init();

    let matches = App::new("robomq-cli")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Robomq Message Broker CLI Tool")
        .subcommand(
            SubCommand::with_name("topic")
                .about("Exercise a TTL topic store")
                .arg(
                    Arg::with_name("name")
                        .short("n")
                        .long("name")
                        .value_name("NAME")
                        .help("Topic name")
                        .default_value("demo")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("retention")
                        .short("r")
                        .long("retention")
                        .value_name("SECONDS")
                        .help("Message retention window in seconds")
                        .default_value("10")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("count")
                        .short("c")
                        .long("count")
                        .value_name("COUNT")
                        .help("Number of messages to put")
                        .default_value("1000")
                        .takes_value(true),
                ),
        )
        .subcommand(
            SubCommand::with_name("arena")
                .about("Exercise a shared-memory arena")
                .arg(
                    Arg::with_name("size")
                        .short("s")
                        .long("size")
                        .value_name("SIZE")
                        .help("Arena size in bytes")
                        .default_value("65536")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("payload_size")
                        .short("p")
                        .long("payload-size")
                        .value_name("SIZE")
                        .help("Payload size per write")
                        .default_value("4096")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("operations")
                        .short("o")
                        .long("operations")
                        .value_name("OPS")
                        .help("Number of write/read cycles")
                        .default_value("100")
                        .takes_value(true),
                ),
        )
        .subcommand(
            SubCommand::with_name("rpc")
                .about("Run a request/reply loopback demo")
                .arg(
                    Arg::with_name("requests")
                        .short("c")
                        .long("requests")
                        .value_name("COUNT")
                        .help("Number of requests")
                        .default_value("100")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("timeout")
                        .short("t")
                        .long("timeout")
                        .value_name("SECONDS")
                        .help("Per-request timeout in seconds")
                        .default_value("1")
                        .takes_value(true),
                ),
        )
        .subcommand(
            SubCommand::with_name("info")
                .about("Show version and build information"),
        )
        .get_matches();

    match matches.subcommand() {
        ("topic", Some(topic_matches)) => handle_topic_commands(topic_matches),
        ("arena", Some(arena_matches)) => handle_arena_commands(arena_matches),
        ("rpc", Some(rpc_matches)) => handle_rpc_commands(rpc_matches),
        ("info", Some(_)) => show_info(),
        _ => {
            println!("Use --help for usage information");
            Ok(())
        }
    }
}

fn parse_arg<T: std::str::FromStr>(
    matches: &clap::ArgMatches,
    name: &str,
) -> std::result::Result<T, RobomqError> {
    matches
        .value_of(name)
        .unwrap()
        .parse()
        .map_err(|_| RobomqError::invalid_parameter(name, "Invalid numeric value"))
}

fn handle_topic_commands(matches: &clap::ArgMatches) -> Result<()> {
    let name = matches.value_of("name").unwrap();
    let retention: f64 = parse_arg(matches, "retention")?;
    let count: usize = parse_arg(matches, "count")?;

    println!("Testing topic store...");
    println!("Topic: {}", name);
    println!("Retention: {}s", retention);
    println!("Messages: {}", count);

    let broker = Broker::new("cli")?;
    broker.add_topic(name, retention)?;

    let start = std::time::Instant::now();
    for i in 0..count {
        let data = format!("message {}", i);
        broker.put_data(name, data.as_bytes())?;
    }
    let put_time = start.elapsed();

    let start = std::time::Instant::now();
    let (payloads, timestamps) = broker.peek_data(name, Order::Earliest, -1);
    let peek_time = start.elapsed();

    println!("\nResults:");
    println!("  Retained: {}", broker.get_topic_status(name));
    println!("  Peeked: {} payloads, {} timestamps", payloads.len(), timestamps.len());
    println!("  Put time: {:.2}ms ({:.0} msg/sec)",
             put_time.as_secs_f64() * 1e3,
             count as f64 / put_time.as_secs_f64());
    println!("  Peek time: {:.2}ms", peek_time.as_secs_f64() * 1e3);

    let (popped, _) = broker.pop_data(name, Order::Earliest, -1);
    println!("  Popped: {} (status now {})", popped.len(), broker.get_topic_status(name));

    Ok(())
}

fn handle_arena_commands(matches: &clap::ArgMatches) -> Result<()> {
    let size: usize = parse_arg(matches, "size")?;
    let payload_size: usize = parse_arg(matches, "payload_size")?;
    let operations: usize = parse_arg(matches, "operations")?;

    println!("Testing shared-memory arena with {} bytes", size);
    println!("Payload size: {} bytes", payload_size);
    println!("Operations: {}", operations);

    let arena_name = format!("cli_arena_{}", std::process::id());
    let arena = ShmArena::create_named(&arena_name, size)?;
    let reader = ShmArenaReader::open_named(&arena_name)?;

    let payload = vec![0xabu8; payload_size];
    let mut fresh = 0usize;
    let mut stale = 0usize;

    let start = std::time::Instant::now();
    for _ in 0..operations {
        let handle = arena.write(&payload)?;
        match reader.read(&handle) {
            Ok(bytes) => {
                assert_eq!(bytes.len(), payload_size);
                fresh += 1;
            }
            Err(RobomqError::StaleHandle { .. }) => stale += 1,
            Err(e) => return Err(e),
        }
    }
    let elapsed = start.elapsed();

    println!("\nResults:");
    println!("  Fresh reads: {}", fresh);
    println!("  Stale handles: {}", stale);
    println!("  Final generation: {}", arena.generation());
    println!("  Cycle time: {:.2}μs avg",
             elapsed.as_micros() as f64 / operations as f64);
    println!("  Throughput: {:.1} MB/s",
             (operations * payload_size) as f64 / elapsed.as_secs_f64() / 1e6);

    Ok(())
}

fn handle_rpc_commands(matches: &clap::ArgMatches) -> Result<()> {
    let requests: usize = parse_arg(matches, "requests")?;
    let timeout_s: f64 = parse_arg(matches, "timeout")?;
    let timeout = Duration::from_secs_f64(timeout_s);

    println!("Running request/reply loopback with {} requests", requests);

    let broker = Arc::new(Broker::new("cli")?);
    broker.add_topic("echo", 10.0)?;

    let responder = {
        let broker = broker.clone();
        thread::spawn(move || {
            for _ in 0..requests {
                let (payloads, topic) = broker.wait_for_request(Duration::from_secs(5));
                if topic.is_empty() {
                    break;
                }
                broker.reply_request(&topic, payloads);
            }
        })
    };

    let start = std::time::Instant::now();
    let mut answered = 0usize;
    for i in 0..requests {
        let data = format!("request {}", i);
        let reply = broker.request_with_data("echo", data.as_bytes(), timeout)?;
        if reply == data.as_bytes() {
            answered += 1;
        }
    }
    let elapsed = start.elapsed();

    responder
        .join()
        .map_err(|_| RobomqError::memory("Responder thread panicked"))?;

    println!("\nResults:");
    println!("  Answered: {}/{}", answered, requests);
    println!("  Total time: {:.2}ms", elapsed.as_secs_f64() * 1e3);
    println!("  Round-trip latency: {:.2}μs avg",
             elapsed.as_micros() as f64 / requests as f64);

    Ok(())
}

fn show_info() -> Result<()> {
    println!("Robomq Message Broker");
    println!("Version: {}", env!("CARGO_PKG_VERSION"));

    println!("\nCapabilities:");
    println!("  - TTL-bounded per-topic message stores");
    println!("  - Shared-memory payload arenas with stale-read detection");
    println!("  - FIFO request/reply with deadline waits");
    println!("  - Uniform bincode envelopes at the transport boundary");

    Ok(())
}
