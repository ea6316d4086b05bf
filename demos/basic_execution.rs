//! Basic example of compiling and executing code in the sandbox.
//!
//! Run with: cargo run --example basic_execution

use script_sandbox::prelude::*;
use script_sandbox::testing::CalcEngine;

fn main() -> Result<()> {
    let sandbox = Sandbox::new(CalcEngine::new(), SandboxConfig::default());

    // Compile once, run many times.
    println!("=== Test 1: Host-context execution ===");
    let unit = sandbox.compile("1 + 1", Some("arith.calc"))?;
    println!("1 + 1 = {}", sandbox.execute_in_host_context(&unit, &ExecOptions::new())?);

    println!("\n=== Test 2: Context bindings as globals ===");
    let unit = sandbox.compile("x * 2", Some("double.calc"))?;
    let ctx = sandbox.create_context();
    ctx.set("x", 21);
    println!("x * 2 with x = 21 -> {}", sandbox.execute_in_context(&unit, &ctx, &ExecOptions::new())?);

    println!("\n=== Test 3: One unit, many contexts ===");
    for x in [1, 2, 3] {
        let ctx = sandbox.create_context();
        ctx.set("x", x);
        println!("x = {x} -> {}", unit.run_in_context(&sandbox, &ctx, &ExecOptions::new())?);
    }

    println!("\n=== Test 4: Compile errors carry the diagnostic ===");
    match sandbox.compile("1 +", Some("broken.calc")) {
        Ok(_) => println!("unexpectedly compiled"),
        Err(e) => println!("compile failed as expected: {e}"),
    }

    println!("\n=== Test 5: Cache artifact (identification only) ===");
    let artifact = unit.cache_artifact();
    println!("artifact: {} bytes, magic {:?}", artifact.len(), &artifact[..4]);

    Ok(())
}
