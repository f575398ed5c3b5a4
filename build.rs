use vergen_gitcl::{Emitter, Gitcl};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let gitcl = Gitcl::builder().sha(true).dirty(true).build();

    // Outside a git checkout vergen emits placeholder values; version.rs
    // ignores anything that is not a commit hash.
    Emitter::default().add_instructions(&gitcl)?.emit()?;

    Ok(())
}
