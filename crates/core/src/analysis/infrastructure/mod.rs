pub mod threaded_batch_analyzer;
