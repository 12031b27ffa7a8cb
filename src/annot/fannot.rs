//! The annotation run.
//!
//! Reference databases are processed in the order given. For each database its entries are loaded,
//! then the queries eligible for annotation are sent through a bounded channel to a pool of worker threads.
//! Workers only read the query states and send back accepted annotations, which are stored once every
//! worker has finished, so pass n+1 sees all the annotations of pass n.
//! The loop stops as soon as a pass has no query to dispatch.

use std::fs::OpenOptions;
use std::io::{self, BufWriter};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;

use cpu_time::ProcessTime;

use super::decision::{is_dispatch_eligible, Annotator};
use super::format::Formats;
use crate::answer::{dump_results, AnnotResult, QueryState};
use crate::errors::{FannotError, Result};
use crate::ips::Ips;
use crate::refdb::RefDb;
use crate::search::{Aligner, Searcher};
use crate::utils::files::load_seq_lookup;
use crate::utils::idseq::{SeqDict, SeqLookup};
use crate::utils::parameters::Param;

pub const DFT_NB_THREADS: usize = 4;

const IPS_NOTE_SEPARATOR: &str = ", InterProScan predictions: ";

/// Annotation of a set of queries against ordered reference databases
pub struct Fannot {
    queries: SeqDict,
    refdbs: Vec<RefDb>,
    states: Vec<QueryState>,
    param: Param,
    formats: Formats,
    nb_threads: usize,
    ips: Option<Ips>,
}

impl Fannot {
    /// param is validated and templates compiled here, before any search
    pub fn new(queries : SeqDict, refdbs : Vec<RefDb>, param : Param) -> Result<Self> {
        param.validate()?;
        let formats = Formats::from_param(&param)?;
        let states = (0..queries.get_nb_seq()).map(|_| QueryState::new(&param)).collect();
        Ok(Fannot { queries, refdbs, states, param, formats, nb_threads: DFT_NB_THREADS, ips: None })
    }

    /// number of worker threads, at least 1
    pub fn set_nb_threads(&mut self, nb_threads : usize) {
        self.nb_threads = nb_threads.max(1);
    }

    pub fn set_ips(&mut self, ips : Ips) {
        self.ips = Some(ips);
    }

    pub fn get_nb_threads(&self) -> usize {
        self.nb_threads
    }

    pub fn get_queries(&self) -> &SeqDict {
        &self.queries
    }

    pub fn get_refdbs(&self) -> &[RefDb] {
        &self.refdbs
    }

    pub fn get_states(&self) -> &[QueryState] {
        &self.states
    }

    pub fn get_result(&self, rank : usize) -> Option<&AnnotResult> {
        self.states.get(rank).map(|s| &s.result)
    }

    // ranks of queries to dispatch in a pass on refdb
    fn get_eligible(&self, refdb : &RefDb) -> Vec<usize> {
        self.states
            .iter()
            .enumerate()
            .filter(|(_, state)| is_dispatch_eligible(state, refdb, &self.param))
            .map(|(qi, _)| qi)
            .collect()
    }

    /// Runs one pass of database db_rank, lookup holding its entries.
    /// Returns the number of queries dispatched, 0 if none was eligible.
    pub fn run_pass<S, A>(&mut self, db_rank : usize, lookup : &SeqLookup, searcher : &S, aligner : &A) -> Result<usize>
    where
        S: Searcher + ?Sized,
        A: Aligner + ?Sized,
    {
        let refdb = self
            .refdbs
            .get(db_rank)
            .ok_or_else(|| FannotError::RefDb(format!("no reference database at rank {}", db_rank)))?;
        let eligible = self.get_eligible(refdb);
        let nb_dispatched = eligible.len();
        log::info!("pass on {} : {} queries to annotate out of {}", refdb.get_id(), nb_dispatched, self.states.len());
        if nb_dispatched == 0 {
            return Ok(0);
        }
        //
        let annotator = Annotator::new(&self.param, &self.formats, searcher, aligner);
        let queries = &self.queries;
        let states = &self.states;
        let abort = AtomicBool::new(false);
        let (query_sender, query_receiver) = crossbeam_channel::bounded::<usize>(2 * self.nb_threads);
        let (result_sender, result_receiver) = crossbeam_channel::unbounded::<(usize, AnnotResult)>();
        //
        let scope_res = crossbeam_utils::thread::scope(|scope| {
            let mut handles = Vec::with_capacity(self.nb_threads);
            for _ in 0..self.nb_threads {
                let receiver = query_receiver.clone();
                let sender = result_sender.clone();
                let annotator = &annotator;
                let abort = &abort;
                handles.push(scope.spawn(move |_| -> Result<usize> {
                    let mut nb_processed = 0;
                    for qi in receiver.iter() {
                        if abort.load(Ordering::Relaxed) {
                            break;
                        }
                        match annotator.evaluate(&queries.0[qi], &states[qi], refdb, lookup) {
                            Ok(Some(result)) => {
                                if sender.send((qi, result)).is_err() {
                                    return Err(FannotError::Worker("result channel closed".to_string()));
                                }
                            }
                            Ok(None) => {}
                            Err(e) => {
                                log::error!("query {} : annotation against {} failed, aborting run",
                                        queries.0[qi].get_fasta_id(), refdb.get_id());
                                abort.store(true, Ordering::Relaxed);
                                return Err(e);
                            }
                        }
                        nb_processed += 1;
                    }
                    Ok(nb_processed)
                }));
            }
            // workers hold the remaining ends of the channels
            drop(query_receiver);
            drop(result_sender);
            for qi in eligible.iter() {
                // fails once all workers have stopped
                if abort.load(Ordering::Relaxed) || query_sender.send(*qi).is_err() {
                    break;
                }
            }
            drop(query_sender);
            //
            let mut first_error: Option<FannotError> = None;
            for handle in handles {
                let res = handle.join().unwrap_or_else(|_| Err(FannotError::Worker("a worker thread panicked".to_string())));
                match res {
                    Ok(nb) => log::trace!("worker processed {} queries", nb),
                    Err(e) => {
                        if first_error.is_none() {
                            first_error = Some(e);
                        }
                    }
                }
            }
            first_error
        });
        match scope_res {
            Ok(None) => {}
            Ok(Some(e)) => return Err(e),
            Err(_) => return Err(FannotError::Worker("annotation scope panicked".to_string())),
        }
        // all workers joined, commit accepted annotations
        let mut nb_accepted = 0;
        for (qi, result) in result_receiver.try_iter() {
            self.states[qi].accept(result);
            nb_accepted += 1;
        }
        log::info!("pass on {} : {} annotations accepted", self.refdbs[db_rank].get_id(), nb_accepted);
        Ok(nb_dispatched)
    } // end of run_pass

    /// Runs passes over databases in order, load_entries gives the entries of each database.
    /// Returns the number of passes that dispatched queries.
    pub fn run_with<S, A, F>(&mut self, searcher : &S, aligner : &A, mut load_entries : F) -> Result<usize>
    where
        S: Searcher + ?Sized,
        A: Aligner + ?Sized,
        F: FnMut(&RefDb) -> Result<SeqLookup>,
    {
        let start_t = SystemTime::now();
        let cpu_start = ProcessTime::now();
        let mut nb_passes = 0;
        for db_rank in 0..self.refdbs.len() {
            let refdb = &self.refdbs[db_rank];
            // no need to load entries if nothing is to be dispatched
            if self.get_eligible(refdb).is_empty() {
                log::info!("no more query to annotate at database {}, skipping remaining databases", refdb.get_id());
                break;
            }
            let lookup = load_entries(refdb)?;
            log::info!("reference database {} : {} entries loaded", refdb.get_id(), lookup.len());
            if self.run_pass(db_rank, &lookup, searcher, aligner)? == 0 {
                break;
            }
            nb_passes += 1;
        }
        let nb_annotated = self.states.iter().filter(|s| s.finished).count();
        log::info!("annotated {} queries out of {} in {} passes", nb_annotated, self.states.len(), nb_passes);
        let cpu_time = cpu_start.elapsed().as_secs();
        log::info!("annotation : cpu time(s) {}", cpu_time);
        if let Ok(elapsed) = start_t.elapsed() {
            log::info!("annotation : elapsed time(s) {}", elapsed.as_secs_f32());
        }
        Ok(nb_passes)
    } // end of run_with

    /// runs all passes, loading database entries from their fasta file
    pub fn run<S, A>(&mut self, searcher : &S, aligner : &A) -> Result<usize>
    where
        S: Searcher + ?Sized,
        A: Aligner + ?Sized,
    {
        self.run_with(searcher, aligner, |refdb| load_seq_lookup(refdb.get_fasta()))
    }

    /// Adds InterProScan predictions to results. Queries without annotation get the predictions in their note.
    /// Returns the number of queries completed.
    pub fn add_ips_annot(&mut self) -> usize {
        let ips = match self.ips.as_ref() {
            Some(ips) => ips,
            None => return 0,
        };
        let mut nb_completed = 0;
        for (query, state) in self.queries.0.iter().zip(self.states.iter_mut()) {
            let entry = match ips.get(query.get_fasta_id()) {
                Some(entry) => entry,
                None => continue,
            };
            for (id, annot) in entry.iter() {
                state.result.ips_id.push(id.clone());
                state.result.ips_annot.push(annot.clone());
            }
            if state.result.status == 0 {
                state.result.note.push_str(IPS_NOTE_SEPARATOR);
                state.result.note.push_str(&state.result.ips_annot.join("; "));
            }
            nb_completed += 1;
        }
        log::info!("InterProScan predictions added to {} queries", nb_completed);
        nb_completed
    } // end of add_ips_annot

    /// writes the annotation table in path, or on stdout
    pub fn write_out(&self, path : Option<&Path>) -> Result<usize> {
        match path {
            Some(path) => {
                log::info!("writing annotations in {:?}", path);
                let file = OpenOptions::new().write(true).create(true).truncate(true).open(path)?;
                dump_results(&self.queries, &self.states, BufWriter::new(file))
            }
            None => dump_results(&self.queries, &self.states, io::stdout().lock()),
        }
    }
} // end of impl Fannot

//==========================================================================================

#[cfg(test)]
mod tests {

    use super::*;
    use crate::refdb::RefDbFlags;
    use crate::utils::idseq::IdSeq;
    use crate::utils::parameters::Rule;
    use fxhash::FxHashMap;
    use std::sync::atomic::AtomicUsize;

    fn log_init_test() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    // hits are given per (database, query)
    #[derive(Default)]
    struct MockSearcher {
        hits: FxHashMap<(String, String), Vec<String>>,
        nb_calls: AtomicUsize,
    }

    impl MockSearcher {
        fn add(&mut self, db : &str, query : &str, hits : &[&str]) {
            self.hits.insert((db.to_string(), query.to_string()), hits.iter().map(|s| s.to_string()).collect());
        }
    }

    impl Searcher for MockSearcher {
        fn search(&self, query : &IdSeq, refdb : &RefDb) -> Result<Vec<String>> {
            self.nb_calls.fetch_add(1, Ordering::Relaxed);
            Ok(self.hits.get(&(refdb.get_id().clone(), query.get_fasta_id().clone())).cloned().unwrap_or_default())
        }
    }

    struct FailingSearcher;

    impl Searcher for FailingSearcher {
        fn search(&self, query : &IdSeq, refdb : &RefDb) -> Result<Vec<String>> {
            Err(FannotError::Search { query: query.get_fasta_id().clone(), db: refdb.get_id().clone(), msg: "crashed".to_string() })
        }
    }

    // similarity given per hit id
    struct MockAligner(FxHashMap<String, f64>);

    impl MockAligner {
        fn new(table : &[(&str, f64)]) -> Self {
            MockAligner(table.iter().map(|(k, v)| (k.to_string(), *v)).collect())
        }
    }

    impl Aligner for MockAligner {
        fn similarity(&self, _query : &IdSeq, hit : &IdSeq) -> Result<f64> {
            Ok(*self.0.get(hit.get_fasta_id()).unwrap_or(&0.))
        }
    }

    fn seq(id : &str, desc : &str, len : usize) -> IdSeq {
        IdSeq::new(id.to_string(), desc.to_string(), vec![b'M'; len])
    }

    fn queries(nb : usize) -> SeqDict {
        SeqDict((0..nb).map(|i| seq(&format!("g{}", i + 1), "", 100)).collect())
    }

    fn refdb(id : &str, flags : RefDbFlags) -> RefDb {
        RefDb::new(id, "", Path::new("blastdb"), Path::new("protein.fasta"), flags)
    }

    fn reviewed() -> RefDbFlags {
        RefDbFlags { reviewed: true, gene_name: true, ..Default::default() }
    }

    fn overwrite() -> RefDbFlags {
        RefDbFlags { overwrite: true, reviewed: true, gene_name: true, ..Default::default() }
    }

    // entries of each database, keyed by database id
    fn entries() -> FxHashMap<String, Vec<IdSeq>> {
        let mut entries = FxHashMap::default();
        entries.insert(
            "DB1".to_string(),
            vec![seq("A1", "Lipase ATG15::ATG15::YCR068W::Saccharomyces cerevisiae.::", 100), seq("A2", "Kinase", 100)],
        );
        entries.insert("DB2".to_string(), vec![seq("B1", "Better lipase::LIP1::::Candida albicans::", 100), seq("B2", "Other", 100)]);
        entries.insert("DB3".to_string(), vec![seq("C1", "Never used", 100)]);
        entries
    }

    fn loader(entries : &FxHashMap<String, Vec<IdSeq>>) -> impl FnMut(&RefDb) -> Result<SeqLookup> + '_ {
        move |refdb: &RefDb| -> Result<SeqLookup> { Ok(entries.get(refdb.get_id()).cloned().unwrap_or_default().into_iter().collect()) }
    }

    #[test]
    fn test_equal_database() {
        log_init_test();
        let mut searcher = MockSearcher::default();
        searcher.add("EQ", "g1", &["E1"]);
        let aligner = MockAligner::new(&[("E1", 100.)]);
        let flags = RefDbFlags { equal: true, reviewed: true, gene_name: true, ..Default::default() };
        let mut fannot = Fannot::new(queries(1), vec![refdb("EQ", flags)], Param::default()).unwrap();
        let lookup: SeqLookup = vec![seq("E1", "Lipase ATG15::ATG15::YCR068W::Saccharomyces cerevisiae.::", 100)].into_iter().collect();
        assert_eq!(fannot.run_pass(0, &lookup, &searcher, &aligner).unwrap(), 1);
        let result = fannot.get_result(0).unwrap();
        assert_eq!(result.similarity, 100.);
        assert_eq!(result.status, 2);
        assert!(result.note.starts_with("uniprot|E1"));
        assert!(fannot.get_states()[0].finished);
    }

    #[test]
    fn test_similar_second_rule() {
        log_init_test();
        let mut searcher = MockSearcher::default();
        searcher.add("DB1", "g1", &["A2"]);
        let aligner = MockAligner::new(&[("A2", 55.)]);
        let mut fannot = Fannot::new(queries(1), vec![refdb("DB1", reviewed())], Param::default()).unwrap();
        // length ratio 72/100
        let lookup: SeqLookup = vec![seq("A2", "Kinase", 72)].into_iter().collect();
        fannot.run_pass(0, &lookup, &searcher, &aligner).unwrap();
        let result = fannot.get_result(0).unwrap();
        assert_eq!(result.status, 1);
        assert!((result.length_ratio - 0.72).abs() < 1e-9);
        assert!(result.note.starts_with("similar to uniprot|A2"));
    }

    #[test]
    fn test_overwrite_accepted() {
        log_init_test();
        let mut searcher = MockSearcher::default();
        searcher.add("DB1", "g1", &["A2"]);
        searcher.add("DB2", "g1", &["B1"]);
        let aligner = MockAligner::new(&[("A2", 55.), ("B1", 90.)]);
        let dbs = vec![refdb("DB1", reviewed()), refdb("DB2", overwrite())];
        let mut fannot = Fannot::new(queries(1), dbs, Param::default()).unwrap();
        let entries = entries();
        assert_eq!(fannot.run_with(&searcher, &aligner, loader(&entries)).unwrap(), 2);
        let result = fannot.get_result(0).unwrap();
        assert_eq!(result.status, 2);
        assert!(result.hit_overwritten);
        assert_eq!(result.hit_id, "B1");
        assert_eq!(result.db_id, "DB2");
        assert_eq!(result.gene_name, "LIP1");
        assert_eq!(result.product, "better lipase");
    }

    #[test]
    fn test_no_overwrite_database() {
        log_init_test();
        let mut searcher = MockSearcher::default();
        searcher.add("DB1", "g1", &["A2"]);
        searcher.add("DB2", "g1", &["B1"]);
        let aligner = MockAligner::new(&[("A2", 55.), ("B1", 90.)]);
        let dbs = vec![refdb("DB1", reviewed()), refdb("DB2", reviewed()), refdb("DB3", reviewed())];
        let mut fannot = Fannot::new(queries(1), dbs, Param::default()).unwrap();
        let entries = entries();
        // second pass has nothing to dispatch, later databases never loaded
        let mut loaded = Vec::<String>::new();
        let mut load = loader(&entries);
        let nb_passes = fannot
            .run_with(&searcher, &aligner, |refdb| {
                loaded.push(refdb.get_id().clone());
                load(refdb)
            })
            .unwrap();
        assert_eq!(nb_passes, 1);
        assert_eq!(loaded, vec!["DB1"]);
        assert_eq!(searcher.nb_calls.load(Ordering::Relaxed), 1);
        let result = fannot.get_result(0).unwrap();
        assert_eq!(result.status, 1);
        assert_eq!(result.hit_id, "A2");
        assert!(!result.hit_overwritten);
    }

    #[test]
    fn test_overwrite_small_gain_rejected() {
        log_init_test();
        let mut param = Param::default();
        // second rule overwrite eligible
        param.rules[1].overwrite = true;
        let mut searcher = MockSearcher::default();
        searcher.add("DB1", "g1", &["A2"]);
        searcher.add("DB2", "g1", &["B2"]);
        let aligner = MockAligner::new(&[("A2", 51.), ("B2", 54.)]);
        let dbs = vec![refdb("DB1", reviewed()), refdb("DB2", overwrite())];
        let mut fannot = Fannot::new(queries(1), dbs, param).unwrap();
        let entries = entries();
        fannot.run_with(&searcher, &aligner, loader(&entries)).unwrap();
        let result = fannot.get_result(0).unwrap();
        assert_eq!(result.status, 1);
        assert_eq!(result.similarity, 51.);
        assert_eq!(result.hit_id, "A2");
        assert!(!result.hit_overwritten);
    }

    #[test]
    fn test_idempotence_and_monotony() {
        log_init_test();
        let mut param = Param::default();
        // annotated queries stay eligible to overwrite
        param.max_status_ow = 2;
        let mut searcher = MockSearcher::default();
        for g in ["g1", "g2", "g3"] {
            searcher.add("DB2", g, &["B1"]);
        }
        let aligner = MockAligner::new(&[("B1", 92.), ("B2", 60.)]);
        let mut fannot = Fannot::new(queries(3), vec![refdb("DB2", overwrite())], param).unwrap();
        fannot.set_nb_threads(2);
        let entries = entries();
        let lookup = loader(&entries)(&fannot.get_refdbs()[0]).unwrap();
        assert_eq!(fannot.run_pass(0, &lookup, &searcher, &aligner).unwrap(), 3);
        let after_first: Vec<AnnotResult> = fannot.get_states().iter().map(|s| s.result.clone()).collect();
        for r in after_first.iter() {
            assert_eq!(r.status, 2);
            assert_eq!(r.hit_id, "B1");
            assert!(!r.hit_overwritten);
        }
        // same database again, no new evidence
        assert_eq!(fannot.run_pass(0, &lookup, &searcher, &aligner).unwrap(), 3);
        let after_second: Vec<AnnotResult> = fannot.get_states().iter().map(|s| s.result.clone()).collect();
        assert_eq!(after_first, after_second);
        // weaker evidence never lowers the status
        let mut weaker = MockSearcher::default();
        for g in ["g1", "g2", "g3"] {
            weaker.add("DB2", g, &["B2"]);
        }
        fannot.run_pass(0, &lookup, &weaker, &aligner).unwrap();
        for state in fannot.get_states() {
            assert_eq!(state.result.status, 2);
            assert_eq!(state.result.hit_id, "B1");
        }
    }

    #[test]
    fn test_many_queries_many_threads() {
        log_init_test();
        let nb_queries = 50;
        let mut searcher = MockSearcher::default();
        for i in 0..nb_queries {
            // one query out of 2 has a hit
            if i % 2 == 0 {
                searcher.add("DB1", &format!("g{}", i + 1), &["A2", "A1"]);
            }
        }
        let aligner = MockAligner::new(&[("A1", 85.), ("A2", 70.)]);
        let mut fannot = Fannot::new(queries(nb_queries), vec![refdb("DB1", reviewed())], Param::default()).unwrap();
        fannot.set_nb_threads(8);
        let entries = entries();
        fannot.run_with(&searcher, &aligner, loader(&entries)).unwrap();
        assert_eq!(searcher.nb_calls.load(Ordering::Relaxed), nb_queries);
        for (i, state) in fannot.get_states().iter().enumerate() {
            if i % 2 == 0 {
                assert!(state.finished);
                assert_eq!(state.result.hit_id, "A1");
                assert_eq!(state.result.hit_num, 2);
            } else {
                assert!(!state.finished);
                assert_eq!(state.result.status, 0);
            }
        }
    }

    #[test]
    fn test_search_failure_aborts() {
        log_init_test();
        let aligner = MockAligner::new(&[]);
        let mut fannot = Fannot::new(queries(20), vec![refdb("DB1", reviewed())], Param::default()).unwrap();
        let entries = entries();
        let res = fannot.run_with(&FailingSearcher, &aligner, loader(&entries));
        assert!(matches!(res, Err(FannotError::Search { .. })));
    }

    #[test]
    fn test_missing_hit_aborts() {
        log_init_test();
        let mut searcher = MockSearcher::default();
        searcher.add("DB1", "g1", &["NOT_IN_FASTA"]);
        let aligner = MockAligner::new(&[]);
        let mut fannot = Fannot::new(queries(3), vec![refdb("DB1", reviewed())], Param::default()).unwrap();
        let entries = entries();
        let res = fannot.run_with(&searcher, &aligner, loader(&entries));
        assert!(matches!(res, Err(FannotError::MissingHit { .. })));
    }

    #[test]
    fn test_bad_param_rejected() {
        let mut param = Param::default();
        param.rules.push(Rule::new(10., 0.1, "", false, false, 0));
        assert!(matches!(Fannot::new(queries(1), vec![], param), Err(FannotError::RuleConfig(_))));
    }

    #[test]
    fn test_ips_and_write_out() {
        log_init_test();
        let mut searcher = MockSearcher::default();
        searcher.add("DB1", "g1", &["A1"]);
        let aligner = MockAligner::new(&[("A1", 95.)]);
        let mut fannot = Fannot::new(queries(2), vec![refdb("DB1", reviewed())], Param::default()).unwrap();
        let mut ips = Ips::default();
        let lines = [
            "g1\tmd5\t300\tPfam\tPF01764\tLipase_3\t10\t150\t1.2E-30\tT\t01-01-2022\tIPR002921\tFungal lipase-like domain",
            "g2\tmd5\t300\tGene3D\tG3D\t-\t10\t150\t1.0E-50\tT\t01-01-2022\tIPR029058\tAlpha/Beta hydrolase fold",
            "g2\tmd5\t300\tPfam\tPF00001\t-\t10\t150\t1.0E-50\tT\t01-01-2022\tIPR000001\tKringle",
        ];
        ips.load_reader(lines.join("\n").as_bytes()).unwrap();
        fannot.set_ips(ips);
        let entries = entries();
        fannot.run_with(&searcher, &aligner, loader(&entries)).unwrap();
        assert_eq!(fannot.add_ips_annot(), 2);
        let r1 = fannot.get_result(0).unwrap();
        assert_eq!(r1.ips_id, vec!["IPR002921"]);
        assert!(!r1.note.contains("InterProScan"));
        let r2 = fannot.get_result(1).unwrap();
        assert_eq!(r2.ips_id, vec!["IPR000001", "IPR029058"]);
        assert_eq!(r2.note, "hypothetical protein, InterProScan predictions: kringle; alpha/Beta hydrolase fold");
        //
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("annot.tsv");
        assert_eq!(fannot.write_out(Some(&path)).unwrap(), 2);
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 3);
        assert!(text.lines().nth(2).unwrap().starts_with("g2\thypothetical protein\t"));
    }
} // end of mod tests
