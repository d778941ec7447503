//! `densedb-demo` — a small CLI exercising the public `densedb` surface:
//! create a table, fill it, sync, print it back, then create a second empty
//! table to confirm a database can hold more than one.

use anyhow::Context;
use clap::Parser;

use densedb::{Database, Field, TableHandle};

/// Create a sample table, fill it with `rows` rows, sync it to disk, and
/// print it back.
#[derive(Parser, Debug)]
#[command(name = "densedb-demo", about = "Exercise the densedb row store")]
struct Args {
    /// Number of rows to fill in the sample table.
    rows: u32,

    /// Directory holding table files (must already exist).
    #[arg(long, default_value = ".")]
    storage_path: std::path::PathBuf,

    /// Soft cap on simultaneously open tables.
    #[arg(long, default_value_t = 4)]
    max_open: usize,
}

const SAMPLE_STRING: &[u8] = b"There's no place like home\0";

/// Number of whole 8-byte strides needed to hold `bit_size` bits. Mirrors
/// `densedb::table`'s internal buffer-sizing rule for `get`/`set`.
fn stride_bytes(bit_size: usize) -> usize {
    (bit_size + 63) / 64 * 8
}

fn sample_fields() -> Vec<Field> {
    vec![
        Field::new("bar", 4),
        Field::new("foo", 8 * SAMPLE_STRING.len() as u32),
        Field::new("baz", 4),
        Field::new("bop", 3),
        Field::new("bip", 2),
        Field::new("bip2", 2),
    ]
}

fn print_stats(table: &TableHandle) {
    println!(
        "Table Name: {}\n      Rows: {}\n  Row Size: {}\n    Fields:",
        table.name(),
        table.rows(),
        table.schema().row_size_bits
    );
    for field in &table.schema().fields {
        println!("  {}:\t{}", field.name, field.size);
    }
}

fn print_rows(table: &TableHandle) -> anyhow::Result<()> {
    let names = ["bar", "foo", "baz", "bop", "bip", "bip2"];
    println!("{}", names.join("\t"));

    let accs: Vec<_> = names
        .iter()
        .map(|n| table.get_accessor(n))
        .collect::<Result<_, _>>()?;

    let mut foo_buf = vec![0u8; stride_bytes(accs[1].size as usize)];
    for row in 0..table.rows() {
        table.get(row, accs[1], &mut foo_buf)?;
        let nul = foo_buf.iter().position(|&b| b == 0).unwrap_or(foo_buf.len());
        let foo = String::from_utf8_lossy(&foo_buf[..nul]);

        let bar = table.get_int(row, accs[0])?;
        let baz = table.get_int(row, accs[2])?;
        let bop = table.get_int(row, accs[3])?;
        let bip = table.get_int(row, accs[4])?;
        let bip2 = table.get_int(row, accs[5])?;

        println!("{bar}\t{foo}\t{baz}\t{bop}\t{bip}\t{bip2}");
    }
    Ok(())
}

fn fill(table: &TableHandle, rows: u32) -> anyhow::Result<()> {
    let accs = [
        table.get_accessor("bar")?,
        table.get_accessor("foo")?,
        table.get_accessor("baz")?,
        table.get_accessor("bop")?,
        table.get_accessor("bip")?,
        table.get_accessor("bip2")?,
    ];

    let mut foo_buf = vec![0u8; stride_bytes(accs[1].size as usize)];
    foo_buf[..SAMPLE_STRING.len()].copy_from_slice(SAMPLE_STRING);

    for row in 0..rows {
        table.set(row, accs[1], &foo_buf)?;
        table.set_int(row, accs[0], (row % 16) as u64)?;
        table.set_int(row, accs[2], (row % 12) as u64)?;
        table.set_int(row, accs[3], (row % 4) as u64)?;
        table.set_int(row, accs[4], (row % 2) as u64)?;
        table.set_int(row, accs[5], (row % 2) as u64)?;
    }
    Ok(())
}

fn run(args: Args) -> anyhow::Result<()> {
    std::fs::create_dir_all(&args.storage_path)
        .with_context(|| format!("creating storage path {}", args.storage_path.display()))?;
    let mut db = Database::new(&args.storage_path, args.max_open)
        .with_context(|| "opening database")?;

    let table = db.create("foo", sample_fields(), args.rows)?;
    db.close(table)?;

    let table = db.open("foo")?;
    fill(&table, args.rows)?;
    table.sync()?;

    print_stats(&table);
    print_rows(&table)?;

    db.close(table)?;

    let second = db.create("foo2", sample_fields(), args.rows)?;
    db.close(second)?;

    db.destroy()?;
    Ok(())
}

fn main() {
    let args = Args::parse();
    if let Err(e) = run(args) {
        eprintln!("densedb-demo: {e:#}");
        std::process::exit(1);
    }
}
