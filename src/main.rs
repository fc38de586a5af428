fn main() {
    if let Err(err) = wordcloud_cn::cli::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
