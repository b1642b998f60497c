//! Parallel processing over checkpoint-delimited ranges.
//!
//! The tokenizer itself is strictly sequential; parallelism comes from the
//! outside. A first sequential pass collects [`Checkpoint`]s at interesting
//! positions, then [`fold_ranges`] runs one independent tokenizer per
//! range, each with its own source handle and buffers, on the rayon pool.

use std::path::Path;

use log::debug;
use rayon::prelude::*;

use crate::core::tokenizer::{Checkpoint, Tag, Tokenizer};
use crate::error::Result;
use crate::source::ByteSource;

/// Runs one tokenizer per checkpoint range of the file at `path` in
/// parallel. Range `i` starts by re-producing the event after
/// `checkpoints[i]` and visits every event whose checkpoint offset is
/// below `checkpoints[i + 1]` (the last range runs to end of stream), so
/// each event of the tail is visited exactly once across all ranges.
///
/// `init` builds one accumulator per range; `visit` folds each event into
/// it with the nesting level it was reported at. Accumulators are returned
/// in range order.
pub fn fold_ranges<T, I, F>(
    path: &Path,
    checkpoints: &[Checkpoint],
    init: I,
    visit: F,
) -> Result<Vec<T>>
where
    T: Send,
    I: Fn() -> T + Sync,
    F: Fn(&mut T, &Tag, usize) + Sync,
{
    debug!(
        "processing {} in {} checkpoint ranges",
        path.display(),
        checkpoints.len()
    );
    checkpoints
        .par_iter()
        .enumerate()
        .map(|(i, start)| {
            let end = checkpoints.get(i + 1).map(Checkpoint::offset);
            let mut tokenizer = Tokenizer::open(path)?;
            let mut acc = init();
            let mut more = tokenizer.restore(start)?;
            while more {
                if end.is_some_and(|e| tokenizer.checkpoint().offset() >= e) {
                    // This event belongs to the next range, which restores
                    // right onto it.
                    break;
                }
                visit(&mut acc, tokenizer.tag(), tokenizer.level());
                more = tokenizer.next()?;
            }
            Ok(acc)
        })
        .collect()
}

/// Collects a checkpoint per event at `stride`-event intervals, starting
/// with the first event. A sequential helper for building the range list
/// consumed by [`fold_ranges`].
pub fn collect_checkpoints<S: ByteSource>(
    tokenizer: &mut Tokenizer<S>,
    stride: usize,
) -> Result<Vec<Checkpoint>> {
    let stride = stride.max(1);
    let mut checkpoints = Vec::new();
    let mut seen = 0usize;
    while tokenizer.next()? {
        if seen % stride == 0 {
            checkpoints.push(tokenizer.checkpoint());
        }
        seen += 1;
    }
    Ok(checkpoints)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    fn temp_doc(name: &str, body: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "pullxml-par-{}-{}",
            std::process::id(),
            name
        ));
        std::fs::write(&path, body).unwrap();
        path
    }

    fn doc_body(records: usize) -> String {
        let mut body = String::from("<log>\n");
        for i in 0..records {
            body.push_str(&format!("  <entry id=\"{i}\">payload {i}</entry>\n"));
        }
        body.push_str("</log>\n");
        body
    }

    fn sequential_names(path: &Path) -> Vec<Vec<u8>> {
        let mut t = Tokenizer::open(path).unwrap();
        let mut names = Vec::new();
        while t.next().unwrap() {
            names.push(t.tag().name().to_vec());
        }
        names
    }

    #[test]
    fn test_parallel_ranges_cover_tail_exactly_once() {
        let path = temp_doc("cover.xml", &doc_body(40));
        let mut t = Tokenizer::open(&path).unwrap();
        let checkpoints = collect_checkpoints(&mut t, 7).unwrap();
        assert!(checkpoints.len() > 2);

        let counts = fold_ranges(&path, &checkpoints, || 0usize, |n, _, _| *n += 1).unwrap();
        let total: usize = counts.iter().sum();
        assert_eq!(total, sequential_names(&path).len());
        assert!(counts.iter().all(|&n| n > 0));
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_parallel_event_order_matches_sequential() {
        let path = temp_doc("order.xml", &doc_body(25));
        let mut t = Tokenizer::open(&path).unwrap();
        let checkpoints = collect_checkpoints(&mut t, 5).unwrap();

        let chunks = fold_ranges(
            &path,
            &checkpoints,
            Vec::new,
            |acc: &mut Vec<Vec<u8>>, tag, _| acc.push(tag.name().to_vec()),
        )
        .unwrap();
        let stitched: Vec<Vec<u8>> = chunks.into_iter().flatten().collect();
        assert_eq!(stitched, sequential_names(&path));
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_parallel_over_gzip_source() {
        let body = doc_body(12);
        let path = std::env::temp_dir().join(format!(
            "pullxml-par-{}-doc.xml.gz",
            std::process::id()
        ));
        let mut enc =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        enc.write_all(body.as_bytes()).unwrap();
        std::fs::write(&path, enc.finish().unwrap()).unwrap();

        let mut t = Tokenizer::open(&path).unwrap();
        let checkpoints = collect_checkpoints(&mut t, 4).unwrap();
        let counts = fold_ranges(&path, &checkpoints, || 0usize, |n, _, _| *n += 1).unwrap();
        assert_eq!(counts.iter().sum::<usize>(), sequential_names(&path).len());
        std::fs::remove_file(&path).unwrap();
    }
}
