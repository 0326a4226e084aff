use miette::Result;
use upmkit_core::version::version_string;

pub fn run(json: bool) -> Result<()> {
    if json {
        let info = serde_json::json!({
            "name": "upmkit",
            "version": upmkit_core::VERSION,
        });
        println!("{info}");
    } else {
        println!("{}", version_string());
    }
    Ok(())
}
