mod crawl_tests;
mod enrich_tests;
mod reconcile_tests;
