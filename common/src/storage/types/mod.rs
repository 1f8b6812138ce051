pub mod prompt_job;
