//! Memory-bounded iteration over a paged, sorted collection.
//!
//! Bulk maintenance jobs run over catalogs that may hold millions of rows,
//! so they never load the whole collection: [`process_pages`] pulls one page
//! at a time from a source and drives a handler per item. The handler gets
//! enough indices to report progress as a monotonic fraction.
//!
//! The processor performs no mutation. Callers that need to mutate the
//! scanned collection must collect ids during the scan and apply the
//! mutations after it finishes; deleting mid-scan shrinks the page window
//! and skips items.

/// A request for one page of a sorted collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub number: usize,
    pub size: usize,
}

impl PageRequest {
    pub fn offset(&self) -> usize {
        self.number * self.size
    }
}

/// One page of items plus the total element count of the collection at the
/// time the page was read.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: usize,
    pub total_elements: u64,
}

/// Iterate every item of `source` exactly once, in the source's sort order,
/// holding at most one page in memory.
///
/// The handler receives `(item, index_in_page, index_overall, total_elements)`.
/// Returns the number of items processed. The first source error aborts the
/// run; there is no cancellation.
pub fn process_pages<T, E, S, H>(
    page_size: usize,
    mut source: S,
    mut handler: H,
) -> Result<u64, E>
where
    S: FnMut(PageRequest) -> Result<Page<T>, E>,
    H: FnMut(&T, usize, u64, u64),
{
    assert!(page_size > 0, "page size must be positive");

    let mut number = 0;
    let mut overall: u64 = 0;
    loop {
        let page = source(PageRequest {
            number,
            size: page_size,
        })?;
        for (index_in_page, item) in page.items.iter().enumerate() {
            handler(item, index_in_page, overall, page.total_elements);
            overall += 1;
        }
        let consumed = (number as u64 + 1) * page_size as u64;
        if page.items.len() < page_size || consumed >= page.total_elements {
            return Ok(overall);
        }
        number += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Paged view over a fixed vector, counting source calls.
    fn vec_source(
        items: Vec<i64>,
        calls: &mut usize,
    ) -> impl FnMut(PageRequest) -> Result<Page<i64>, ()> + '_ {
        move |req| {
            *calls += 1;
            let start = req.offset().min(items.len());
            let end = (start + req.size).min(items.len());
            Ok(Page {
                items: items[start..end].to_vec(),
                number: req.number,
                total_elements: items.len() as u64,
            })
        }
    }

    #[test]
    fn visits_every_item_in_order() {
        let items: Vec<i64> = (0..10).collect();
        let mut calls = 0;
        let mut seen = Vec::new();
        let count = process_pages(3, vec_source(items, &mut calls), |item, _, _, _| {
            seen.push(*item)
        })
        .unwrap();
        assert_eq!(count, 10);
        assert_eq!(seen, (0..10).collect::<Vec<i64>>());
        // 10 items at page size 3 -> 4 pages, 4 source calls.
        assert_eq!(calls, 4);
    }

    #[test]
    fn exact_multiple_queries_source_exactly_k_times() {
        let items: Vec<i64> = (0..12).collect();
        let mut calls = 0;
        let count =
            process_pages(4, vec_source(items, &mut calls), |_, _, _, _| {}).unwrap();
        assert_eq!(count, 12);
        assert_eq!(calls, 3);
    }

    #[test]
    fn empty_collection_queries_source_once() {
        let mut calls = 0;
        let count =
            process_pages(5, vec_source(Vec::new(), &mut calls), |_, _, _, _| {}).unwrap();
        assert_eq!(count, 0);
        assert_eq!(calls, 1);
    }

    #[test]
    fn progress_fraction_is_monotonic_and_bounded() {
        let items: Vec<i64> = (0..7).collect();
        let mut calls = 0;
        let mut last = -1.0;
        process_pages(2, vec_source(items, &mut calls), |_, _, overall, total| {
            let fraction = overall as f64 / total as f64;
            assert!(fraction >= last);
            assert!((0.0..1.0).contains(&fraction));
            last = fraction;
        })
        .unwrap();
    }

    #[test]
    fn source_error_aborts_run() {
        let mut handled = 0;
        let result = process_pages(
            2,
            |req: PageRequest| {
                if req.number == 0 {
                    Ok(Page {
                        items: vec![1, 2],
                        number: 0,
                        total_elements: 10,
                    })
                } else {
                    Err("page source failed")
                }
            },
            |_: &i64, _, _, _| handled += 1,
        );
        assert_eq!(result, Err("page source failed"));
        assert_eq!(handled, 2);
    }

    #[test]
    fn index_in_page_resets_per_page() {
        let items: Vec<i64> = (0..5).collect();
        let mut calls = 0;
        let mut indices = Vec::new();
        process_pages(2, vec_source(items, &mut calls), |_, in_page, _, _| {
            indices.push(in_page)
        })
        .unwrap();
        assert_eq!(indices, vec![0, 1, 0, 1, 0]);
    }
}
