pub struct CaseResult {
    pub name: &'static str,
    pub error: Option<String>,
}

impl CaseResult {
    pub fn from_result(name: &'static str, result: anyhow::Result<()>) -> Self {
        Self {
            name,
            error: result.err().map(|e| format!("{e:#}")),
        }
    }
}

/// Print results and fail when any case failed.
pub fn report(title: &str, cases: &[CaseResult]) -> anyhow::Result<()> {
    println!("=== {title} ===");
    let mut passed = 0;
    for case in cases {
        match &case.error {
            None => {
                println!("  PASS  {}", case.name);
                passed += 1;
            }
            Some(e) => println!("  FAIL  {}: {e}", case.name),
        }
    }
    println!();
    println!("{passed}/{} passed", cases.len());
    println!();

    if passed < cases.len() {
        anyhow::bail!("{title}: {} case(s) failed", cases.len() - passed);
    }
    Ok(())
}
