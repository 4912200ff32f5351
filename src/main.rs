use dbf_reader::{Record, TableOptions};
use std::env;

fn print_record(index: usize, record: &Record) {
    let fields: Vec<String> = record
        .iter()
        .map(|(name, value)| format!("{}={}", name, value))
        .collect();
    println!("  {}. {}", index + 1, fields.join(", "));
}

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!(
            "Usage: {} <path-to-dbf-file> [--encoding <LABEL>] [--limit <N>] [--deleted] [--ignore-missing-memo]",
            args[0]
        );
        std::process::exit(1);
    }

    let dbf_path = &args[1];
    let mut options = TableOptions::new();
    let mut limit = 10usize;

    if let Some(idx) = args.iter().position(|arg| arg == "--encoding") {
        match args.get(idx + 1) {
            Some(label) => options = options.encoding(label.as_str()),
            None => {
                eprintln!("ERROR: --encoding flag requires an argument.");
                std::process::exit(1);
            }
        }
    }
    if let Some(idx) = args.iter().position(|arg| arg == "--limit") {
        match args.get(idx + 1).and_then(|n| n.parse().ok()) {
            Some(n) => limit = n,
            None => {
                eprintln!("ERROR: --limit flag requires a number.");
                std::process::exit(1);
            }
        }
    }
    if args.iter().any(|arg| arg == "--ignore-missing-memo") {
        options = options.ignore_missing_memofile(true);
    }
    let show_deleted = args.iter().any(|arg| arg == "--deleted");

    println!("Reading DBF file: {}", dbf_path);
    println!("{}", "=".repeat(60));

    let table = match options.open(dbf_path) {
        Ok(table) => table,
        Err(e) => {
            eprintln!("\nERROR: Failed to open DBF file");
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    };

    println!("\nTable Information:");
    println!("  Name: {}", table.name());
    println!("  Version: {} (0x{:02x})", table.dbversion_description(), table.dbversion());
    println!("  Encoding: {}", table.encoding().name());
    match table.date_modified() {
        Some(date) => println!("  Last modified: {}", date),
        None => println!("  Last modified: unknown"),
    }
    if let Some(memo) = table.memo_path() {
        println!("  Memo file: {}", memo.display());
    }

    println!("\nFields:");
    for field in table.fields() {
        println!(
            "  {:<11} {} {:>5} {:>3}",
            field.name,
            field.type_char(),
            field.length,
            field.decimal_count
        );
    }

    println!("\nStatistics:");
    println!("  Records in header: {}", table.record_count());
    match (table.records().len(), table.deleted().len()) {
        (Ok(active), Ok(deleted)) => {
            println!("  Active records: {}", active);
            println!("  Deleted records: {}", deleted);
        }
        (Err(e), _) | (_, Err(e)) => {
            eprintln!("\nERROR: Failed to count records");
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    }

    let (title, records) = if show_deleted {
        ("Deleted", table.iter_deleted())
    } else {
        ("Active", table.iter_records())
    };
    println!("\nSample {} Records (first {}):", title, limit);
    for (i, result) in records.take(limit).enumerate() {
        match result {
            Ok(record) => print_record(i, &record),
            Err(e) => println!("  {}. ERROR: {}", i + 1, e),
        }
    }
}
