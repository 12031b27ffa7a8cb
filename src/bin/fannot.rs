//! fannot : functional annotation of protein sequences.
//!
//! fannot run --query [-q] queries.fasta --refdb [-r] DB1,DB2 [--dirdb [-d] dir] [--rules rules.json] [--ips ips.tsv]
//!            [--threads [-t] nb] [--output [-o] annot.tsv] [--aligner builtin|needle]
//!
//! - refdb is a comma separated list of database ids (or config.json paths), searched in that order.
//! - rules is a json file of annotation parameters, defaults are used for missing fields.
//! - ips is the tsv output of InterProScan on the queries.
//! - without --output the annotation table is written on stdout.
//!
//! fannot refdb-create --input [-i] proteins.fasta --id ID --outdir [-o] dir [--desc text]
//!                     [--equal] [--overwrite] [--reviewed] [--gene-name]
//!
//! fannot refdb-info --dirdb [-d] dir
//!
//! Logging is driven by RUST_LOG.

use std::path::Path;

use anyhow::Context;
use clap::{Arg, ArgAction, ArgMatches, Command};

// for logging (debug mostly, switched at compile time in cargo.toml)
use env_logger::Builder;

use fannot::annot::fannot::DFT_NB_THREADS;
use fannot::annot::Fannot;
use fannot::ips::{Ips, D_MAX_EVALUE};
use fannot::refdb::{find_refdbs, list_refdbs, RefDb, RefDbFlags};
use fannot::search::blast::{DFT_BLASTP, DFT_EVALUE, DFT_MAX_TARGET_SEQS};
use fannot::search::needle::{DFT_GAP_EXTEND, DFT_GAP_OPEN, DFT_NEEDLE};
use fannot::search::{AlignParams, Aligner, BlastParams, BlastSearch, GlobalAligner, NeedleCommand};
use fannot::utils::files::load_queries;
use fannot::utils::parameters::Param;

// install a logger facility
pub fn init_log() -> u64 {
    Builder::from_default_env().init();
    log::info!("logger initialized");
    1
}

#[doc(hidden)]
fn parse_run(matches : &ArgMatches) -> anyhow::Result<()> {
    log::debug!("in parse_run");
    let query_path = matches.get_one::<String>("query").context("--query is mandatory")?;
    let refdb_ids = matches.get_one::<String>("refdb").context("--refdb is mandatory")?;
    let dirdb = matches.get_one::<String>("dirdb").map(Path::new);
    //
    let param = match matches.get_one::<String>("rules") {
        Some(rules) => Param::reload_json(Path::new(rules)).with_context(|| format!("cannot load rules from {}", rules))?,
        None => Param::default(),
    };
    if let Some(dump) = matches.get_one::<String>("dump_rules") {
        param.dump_json(Path::new(dump)).with_context(|| format!("cannot dump rules in {}", dump))?;
    }
    let refdbs = find_refdbs(refdb_ids, dirdb).context("cannot find reference databases")?;
    log::info!("reference databases : {:?}", refdbs.iter().map(|r| r.get_id()).collect::<Vec<&String>>());
    let queries = load_queries(Path::new(query_path)).with_context(|| format!("cannot load queries from {}", query_path))?;
    //
    let nb_threads = *matches.get_one::<usize>("threads").unwrap_or(&DFT_NB_THREADS);
    let nb_cpus = num_cpus::get();
    if nb_threads > nb_cpus {
        log::warn!("asking for {} threads with {} cpus available", nb_threads, nb_cpus);
    }
    let mut fannot = Fannot::new(queries, refdbs, param).context("bad annotation parameters")?;
    fannot.set_nb_threads(nb_threads);
    if let Some(ips_path) = matches.get_one::<String>("ips") {
        let mut ips = Ips::new(*matches.get_one::<f64>("ips_evalue").unwrap_or(&D_MAX_EVALUE));
        ips.load_file(Path::new(ips_path)).with_context(|| format!("cannot load InterProScan predictions from {}", ips_path))?;
        fannot.set_ips(ips);
    }
    //
    let blast_params = BlastParams {
        binary: matches.get_one::<String>("blastp").cloned().unwrap_or_else(|| DFT_BLASTP.to_string()),
        evalue: *matches.get_one::<f64>("evalue").unwrap_or(&DFT_EVALUE),
        max_target_seqs: *matches.get_one::<usize>("max_target_seqs").unwrap_or(&DFT_MAX_TARGET_SEQS),
    };
    let align_params = AlignParams {
        gap_open: *matches.get_one::<f64>("gapopen").unwrap_or(&DFT_GAP_OPEN),
        gap_extend: *matches.get_one::<f64>("gapextend").unwrap_or(&DFT_GAP_EXTEND),
    };
    let searcher = BlastSearch::new(blast_params);
    let aligner: Box<dyn Aligner> = match matches.get_one::<String>("aligner").map(|s| s.as_str()) {
        Some("needle") => {
            let binary = matches.get_one::<String>("needle").map(|s| s.as_str()).unwrap_or(DFT_NEEDLE);
            Box::new(NeedleCommand::new(binary, align_params)?)
        }
        _ => Box::new(GlobalAligner::new(align_params)?),
    };
    //
    fannot.run(&searcher, aligner.as_ref()).context("annotation failed")?;
    fannot.add_ips_annot();
    let output = matches.get_one::<String>("output").map(Path::new);
    let nb_rows = fannot.write_out(output).context("cannot write annotations")?;
    log::info!("wrote {} annotations", nb_rows);
    Ok(())
} // end of parse_run

#[doc(hidden)]
fn parse_refdb_create(matches : &ArgMatches) -> anyhow::Result<()> {
    log::debug!("in parse_refdb_create");
    let input = matches.get_one::<String>("input").context("--input is mandatory")?;
    let id = matches.get_one::<String>("id").context("--id is mandatory")?;
    let outdir = matches.get_one::<String>("outdir").context("--outdir is mandatory")?;
    let desc = matches.get_one::<String>("desc").map(|s| s.as_str()).unwrap_or("");
    let makeblastdb = matches.get_one::<String>("makeblastdb").map(|s| s.as_str()).unwrap_or("makeblastdb");
    let flags = RefDbFlags {
        equal: matches.get_flag("equal"),
        overwrite: matches.get_flag("overwrite"),
        reviewed: matches.get_flag("reviewed"),
        gene_name: matches.get_flag("gene_name"),
    };
    let refdb = RefDb::create_from_fasta(Path::new(outdir), id, Path::new(input), desc, flags, makeblastdb)
        .with_context(|| format!("cannot create reference database {} from {}", id, input))?;
    println!("{}", RefDb::info_header());
    println!("{}", refdb.info_line());
    Ok(())
} // end of parse_refdb_create

#[doc(hidden)]
fn parse_refdb_info(matches : &ArgMatches) -> anyhow::Result<()> {
    let dirdb = matches.get_one::<String>("dirdb").context("--dirdb is mandatory")?;
    let refdbs = list_refdbs(Path::new(dirdb)).with_context(|| format!("cannot list databases in {}", dirdb))?;
    println!("{}", RefDb::info_header());
    for refdb in refdbs.iter() {
        println!("{}", refdb.info_line());
    }
    Ok(())
}

//============================================================================================

fn main() -> anyhow::Result<()> {
    let _ = init_log();

    let run_cmd = Command::new("run")
        .about("Annotate query proteins against ordered reference databases")
        .arg(
            Arg::new("query")
                .short('q')
                .long("query")
                .value_name("FASTA")
                .help("fasta file of the query proteins")
                .required(true)
                .value_parser(clap::value_parser!(String)),
        )
        .arg(
            Arg::new("refdb")
                .short('r')
                .long("refdb")
                .value_name("IDS")
                .help("comma separated list of reference database ids, in decreasing order of precedence")
                .required(true)
                .value_parser(clap::value_parser!(String)),
        )
        .arg(
            Arg::new("dirdb")
                .short('d')
                .long("dirdb")
                .value_name("DIR")
                .help("directory containing the reference databases")
                .value_parser(clap::value_parser!(String)),
        )
        .arg(
            Arg::new("rules")
                .long("rules")
                .value_name("JSON")
                .help("json file of annotation rules and parameters")
                .value_parser(clap::value_parser!(String)),
        )
        .arg(
            Arg::new("dump_rules")
                .long("dump-rules")
                .value_name("JSON")
                .help("dump the annotation parameters used in a json file")
                .value_parser(clap::value_parser!(String)),
        )
        .arg(
            Arg::new("ips")
                .long("ips")
                .value_name("TSV")
                .help("InterProScan tsv output for the queries")
                .value_parser(clap::value_parser!(String)),
        )
        .arg(
            Arg::new("ips_evalue")
                .long("ips-evalue")
                .value_name("EVALUE")
                .help("maximal e-value of InterProScan matches")
                .action(ArgAction::Set)
                .value_parser(clap::value_parser!(f64))
                .default_value("1e-10"),
        )
        .arg(
            Arg::new("threads")
                .short('t')
                .long("threads")
                .value_name("NB")
                .help("number of worker threads")
                .action(ArgAction::Set)
                .value_parser(clap::value_parser!(usize))
                .default_value("4"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("TSV")
                .help("output annotation table, stdout if absent")
                .value_parser(clap::value_parser!(String)),
        )
        .arg(
            Arg::new("aligner")
                .long("aligner")
                .value_name("ALIGNER")
                .help("global aligner : builtin or needle (EMBOSS)")
                .value_parser(["builtin", "needle"])
                .default_value("builtin"),
        )
        .arg(
            Arg::new("blastp")
                .long("blastp")
                .value_name("PATH")
                .help("blastp program")
                .value_parser(clap::value_parser!(String))
                .default_value(DFT_BLASTP),
        )
        .arg(
            Arg::new("evalue")
                .long("evalue")
                .value_name("EVALUE")
                .help("blastp e-value threshold")
                .value_parser(clap::value_parser!(f64))
                .default_value("10"),
        )
        .arg(
            Arg::new("max_target_seqs")
                .long("max-target-seqs")
                .value_name("NB")
                .help("blastp maximal number of hits")
                .value_parser(clap::value_parser!(usize))
                .default_value("500"),
        )
        .arg(
            Arg::new("needle")
                .long("needle")
                .value_name("PATH")
                .help("needle program, with --aligner needle")
                .value_parser(clap::value_parser!(String))
                .default_value(DFT_NEEDLE),
        )
        .arg(
            Arg::new("gapopen")
                .long("gapopen")
                .value_name("PENALTY")
                .help("gap opening penalty of global alignments")
                .value_parser(clap::value_parser!(f64))
                .default_value("10"),
        )
        .arg(
            Arg::new("gapextend")
                .long("gapextend")
                .value_name("PENALTY")
                .help("gap extension penalty of global alignments")
                .value_parser(clap::value_parser!(f64))
                .default_value("0.5"),
        );

    let create_cmd = Command::new("refdb-create")
        .about("Create a reference database from a protein fasta file")
        .arg(
            Arg::new("input")
                .short('i')
                .long("input")
                .value_name("FASTA")
                .help("fasta file of reference proteins, descriptions as short::gene::locus::organism::long or plain text")
                .required(true)
                .value_parser(clap::value_parser!(String)),
        )
        .arg(
            Arg::new("id")
                .long("id")
                .value_name("ID")
                .help("database id, also the name of its directory")
                .required(true)
                .value_parser(clap::value_parser!(String)),
        )
        .arg(
            Arg::new("outdir")
                .short('o')
                .long("outdir")
                .value_name("DIR")
                .help("directory where the database directory is created")
                .required(true)
                .value_parser(clap::value_parser!(String)),
        )
        .arg(
            Arg::new("desc")
                .long("desc")
                .value_name("TEXT")
                .help("database description")
                .value_parser(clap::value_parser!(String)),
        )
        .arg(
            Arg::new("makeblastdb")
                .long("makeblastdb")
                .value_name("PATH")
                .help("makeblastdb program")
                .value_parser(clap::value_parser!(String))
                .default_value("makeblastdb"),
        )
        .arg(Arg::new("equal").long("equal").help("the database contains the query proteins").action(ArgAction::SetTrue))
        .arg(Arg::new("overwrite").long("overwrite").help("annotations can overwrite previous ones").action(ArgAction::SetTrue))
        .arg(Arg::new("reviewed").long("reviewed").help("entries are reviewed").action(ArgAction::SetTrue))
        .arg(Arg::new("gene_name").long("gene-name").help("gene names can be transferred").action(ArgAction::SetTrue));

    let info_cmd = Command::new("refdb-info").about("List the reference databases of a directory").arg(
        Arg::new("dirdb")
            .short('d')
            .long("dirdb")
            .value_name("DIR")
            .help("directory containing the reference databases")
            .required(true)
            .value_parser(clap::value_parser!(String)),
    );

    //
    // the global command
    //
    let matches = Command::new("fannot")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Functional annotation of proteins from ordered reference databases")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(run_cmd)
        .subcommand(create_cmd)
        .subcommand(info_cmd)
        .get_matches();

    match matches.subcommand() {
        Some(("run", sub)) => parse_run(sub),
        Some(("refdb-create", sub)) => parse_refdb_create(sub),
        Some(("refdb-info", sub)) => parse_refdb_info(sub),
        _ => anyhow::bail!("unknown subcommand"),
    }
} // end of main
