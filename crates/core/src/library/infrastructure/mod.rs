pub mod json_library_repository;
