#![no_main]

use libfuzzer_sys::fuzz_target;
use pagemerge::PageId;
use pagemerge::config::PageSelection;

fuzz_target!(|data: &[u8]| {
    let s = std::str::from_utf8(data).unwrap_or("");

    if let Ok(picks) = PageSelection::parse_list(s) {
        assert!(!picks.is_empty());
        assert!(picks.iter().all(|p| p.rotation.as_degrees() % 90 == 0));
        assert!(picks.iter().all(|p| p.first_page <= p.last_page));
    }

    if let Ok((file, index)) = PageId::from(s).parse() {
        assert_eq!(PageId::derive(&file, index).as_str(), s);
    }
});
