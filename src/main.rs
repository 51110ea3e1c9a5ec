use std::cmp::Ordering;
use std::fs;
use std::io::{self, prelude::*};
use std::path;
use std::process;

use bytesize::ByteSize;
use clap::ArgEnum;
use env_logger;
use log;

use ext_merge_sort::block::mem::MemoryLimitedBlockBuilder;
use ext_merge_sort::{
    BlockBuilder, ExternalSorterBuilder, LimitedBlockBuilder, LinesFormat, RunFormat, SortError, SortStats,
};

type Compare = fn(&String, &String) -> Ordering;

struct SortSettings<'a> {
    threads: Option<usize>,
    merge_concurrency: Option<usize>,
    tmp_dir: Option<&'a str>,
    compare: Compare,
}

fn main() {
    let arg_parser = build_arg_parser();

    let log_level: LogLevel = arg_parser.value_of_t_or_exit("log_level");
    init_logger(log_level);

    let order: Order = arg_parser.value_of_t_or_exit("sort");
    let numeric = arg_parser.is_present("numeric");
    let compare: Compare = match (order, numeric) {
        (Order::Asc, false) => |a: &String, b: &String| a.cmp(b),
        (Order::Desc, false) => |a: &String, b: &String| b.cmp(a),
        (Order::Asc, true) => |a: &String, b: &String| compare_numeric(a, b),
        (Order::Desc, true) => |a: &String, b: &String| compare_numeric(b, a),
    };

    let settings = SortSettings {
        threads: arg_parser
            .is_present("threads")
            .then(|| arg_parser.value_of_t_or_exit("threads")),
        merge_concurrency: arg_parser
            .is_present("merge_concurrency")
            .then(|| arg_parser.value_of_t_or_exit("merge_concurrency")),
        tmp_dir: arg_parser.value_of("tmp_dir"),
        compare,
    };

    let input = arg_parser.value_of("input").expect("value is required");
    let input_stream = match fs::File::open(input) {
        Ok(file) => io::BufReader::new(file),
        Err(err) => {
            log::error!("input file opening error: {}", err);
            process::exit(1);
        }
    };

    let output = arg_parser.value_of("output").expect("value is required");
    let mut output_stream = match fs::File::create(output) {
        Ok(file) => io::BufWriter::new(file),
        Err(err) => {
            log::error!("output file creation error: {}", err);
            process::exit(1);
        }
    };

    let block_size: Option<usize> = arg_parser
        .is_present("block_size")
        .then(|| arg_parser.value_of_t_or_exit("block_size"));
    let memory = parse_byte_size(arg_parser.value_of("memory"));
    let record_size = parse_byte_size(arg_parser.value_of("record_size"));

    let result = match (block_size, memory, record_size) {
        (Some(block_size), _, _) => sort(
            LimitedBlockBuilder::new(block_size, false),
            &settings,
            input_stream,
            &mut output_stream,
        ),
        (None, Some(memory), Some(record_size)) => sort(
            LimitedBlockBuilder::with_memory_budget(memory, record_size),
            &settings,
            input_stream,
            &mut output_stream,
        ),
        (None, Some(memory), None) => sort(
            MemoryLimitedBlockBuilder::new(memory),
            &settings,
            input_stream,
            &mut output_stream,
        ),
        (None, None, _) => {
            log::error!("either block size or memory limit is required");
            process::exit(1);
        }
    };

    match result {
        Ok(stats) => log::info!(
            "{} records sorted (runs: {}, merge passes: {})",
            stats.records,
            stats.runs,
            stats.merge_passes
        ),
        Err(err) => {
            log::error!("data sorting error: {}", err);
            process::exit(1);
        }
    }
    drop(output_stream);

    if arg_parser.is_present("verify") {
        match is_sorted(path::Path::new(output), compare) {
            Ok(true) => log::info!("output verified: records are ordered"),
            Ok(false) => {
                log::error!("output verification failed: records are out of order");
                process::exit(2);
            }
            Err(err) => {
                log::error!("output verification error: {}", err);
                process::exit(1);
            }
        }
    }
}

fn sort<B, R, W>(
    block_builder: B,
    settings: &SortSettings,
    input: R,
    output: &mut W,
) -> Result<SortStats, SortError<io::Error>>
where
    B: BlockBuilder<String>,
    R: BufRead,
    W: Write,
{
    let mut sorter_builder = ExternalSorterBuilder::<String, io::Error, B, LinesFormat>::new().with_buffer(block_builder);
    if let Some(threads) = settings.threads {
        sorter_builder = sorter_builder.with_threads_number(threads);
    }

    if let Some(merge_concurrency) = settings.merge_concurrency {
        sorter_builder = sorter_builder.with_merge_concurrency(merge_concurrency);
    }

    if let Some(tmp_dir) = settings.tmp_dir {
        sorter_builder = sorter_builder.with_tmp_dir(path::Path::new(tmp_dir));
    }

    let sorter = sorter_builder.build()?;
    sorter.sort_into(read_lines(input), settings.compare, output)
}

/// Reads `\n` terminated lines keeping everything else, `\r` of CRLF line endings included,
/// so sorted lines are written back unchanged. A last line without `\n` gets one in the output.
fn read_lines<R: BufRead>(mut input: R) -> impl Iterator<Item = io::Result<String>> {
    std::iter::from_fn(move || LinesFormat::read_record(&mut input))
}

/// Compares lines as integers. Lines that are not integers go after the numbers in lexicographical order.
fn compare_numeric(a: &String, b: &String) -> Ordering {
    match (a.trim().parse::<i64>(), b.trim().parse::<i64>()) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

fn is_sorted(path: &path::Path, compare: Compare) -> io::Result<bool> {
    let reader = io::BufReader::new(fs::File::open(path)?);
    let mut prev: Option<String> = None;

    for line in read_lines(reader) {
        let line = line?;
        if let Some(prev) = &prev {
            if compare(prev, &line) == Ordering::Greater {
                return Ok(false);
            }
        }
        prev = Some(line);
    }

    Ok(true)
}

fn parse_byte_size(value: Option<&str>) -> Option<u64> {
    value.map(|v| v.parse::<ByteSize>().expect("value is pre-validated").as_u64())
}

#[derive(Copy, Clone, clap::ArgEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn possible_values() -> impl Iterator<Item = clap::PossibleValue<'static>> {
        Self::value_variants().iter().filter_map(|v| v.to_possible_value())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <LogLevel as clap::ArgEnum>::from_str(s, false)
    }
}

#[derive(Copy, Clone, clap::ArgEnum)]
enum Order {
    Asc,
    Desc,
}

impl Order {
    pub fn possible_values() -> impl Iterator<Item = clap::PossibleValue<'static>> {
        Order::value_variants().iter().filter_map(|v| v.to_possible_value())
    }
}

impl std::str::FromStr for Order {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <Order as clap::ArgEnum>::from_str(s, false)
    }
}

fn validate_byte_size(v: &str) -> Result<(), String> {
    match v.parse::<ByteSize>() {
        Ok(_) => Ok(()),
        Err(err) => Err(format!("size format incorrect: {}", err)),
    }
}

fn build_arg_parser() -> clap::ArgMatches {
    clap::App::new("ext-merge-sort")
        .about("external merge sorter of text lines")
        .arg(
            clap::Arg::new("input")
                .short('i')
                .long("input")
                .help("file to be sorted")
                .required(true)
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("output")
                .short('o')
                .long("output")
                .help("result file")
                .required(true)
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("sort")
                .short('s')
                .long("sort")
                .help("sorting order")
                .takes_value(true)
                .default_value("asc")
                .possible_values(Order::possible_values()),
        )
        .arg(
            clap::Arg::new("numeric")
                .short('n')
                .long("numeric")
                .help("compare lines as integers"),
        )
        .arg(
            clap::Arg::new("log_level")
                .short('l')
                .long("loglevel")
                .help("logging level")
                .takes_value(true)
                .default_value("info")
                .possible_values(LogLevel::possible_values()),
        )
        .arg(
            clap::Arg::new("threads")
                .short('t')
                .long("threads")
                .help("number of threads to use for parallel sorting and merging")
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("merge_concurrency")
                .short('m')
                .long("merge-concurrency")
                .help("maximum number of run pairs merged at the same time")
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("tmp_dir")
                .short('d')
                .long("tmp-dir")
                .help("directory to be used to store temporary data")
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("block_size")
                .short('b')
                .long("block-size")
                .help("number of lines sorted in memory at once")
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("memory")
                .short('M')
                .long("memory")
                .help("memory used to sort lines in memory at once")
                .takes_value(true)
                .validator(validate_byte_size),
        )
        .arg(
            clap::Arg::new("record_size")
                .short('r')
                .long("record-size")
                .help("estimated memory size of a line, derives block size from the memory limit")
                .takes_value(true)
                .requires("memory")
                .validator(validate_byte_size),
        )
        .group(
            clap::ArgGroup::new("block")
                .args(&["block_size", "memory"])
                .required(true),
        )
        .arg(
            clap::Arg::new("verify")
                .long("verify")
                .help("check that the result file is ordered"),
        )
        .get_matches()
}

fn init_logger(log_level: LogLevel) {
    env_logger::Builder::new()
        .filter_level(match log_level {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        })
        .format_timestamp_millis()
        .init();
}

#[cfg(test)]
mod test {
    use std::cmp::Ordering;
    use std::io::Cursor;

    use rstest::*;

    use super::{compare_numeric, read_lines, sort, Compare, SortSettings};
    use ext_merge_sort::LimitedBlockBuilder;

    #[rstest]
    #[case("2", "10", Ordering::Less)]
    #[case("-5", "3", Ordering::Less)]
    #[case(" 7", "7", Ordering::Equal)]
    #[case("10", "abc", Ordering::Less)]
    #[case("abd", "abc", Ordering::Greater)]
    fn test_compare_numeric(#[case] a: &str, #[case] b: &str, #[case] expected: Ordering) {
        assert_eq!(compare_numeric(&a.to_string(), &b.to_string()), expected);
    }

    #[rstest]
    #[case("b\r\na\r\nc\r\n", "a\r\nb\r\nc\r\n")]
    #[case("b\r\nc\na", "a\nb\r\nc\n")]
    #[case("", "")]
    fn test_sort_keeps_line_endings(#[case] input: &str, #[case] expected: &str) {
        let tmp_dir = tempfile::tempdir_in("./").unwrap();
        let settings = SortSettings {
            threads: Some(2),
            merge_concurrency: None,
            tmp_dir: tmp_dir.path().to_str(),
            compare: String::cmp as Compare,
        };

        let mut output = Vec::new();
        sort(
            LimitedBlockBuilder::new(2, false),
            &settings,
            Cursor::new(input.as_bytes()),
            &mut output,
        )
        .unwrap();

        assert_eq!(String::from_utf8(output).unwrap(), expected);
    }

    #[test]
    fn test_read_lines() {
        let lines: Result<Vec<String>, _> = read_lines(Cursor::new("x\r\n\ny".as_bytes())).collect();
        assert_eq!(lines.unwrap(), vec!["x\r", "", "y"]);
    }
}
