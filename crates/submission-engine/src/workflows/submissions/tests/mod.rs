mod bulk;
mod common;
mod report;
mod review;
