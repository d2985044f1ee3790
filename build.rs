/// Build script for ForgeRender
///
/// HLSL shaders are compiled at runtime via D3DCompile;
/// the build script only triggers a rebuild when they change.
fn main() {
    println!("cargo:rerun-if-changed=shaders/forward.hlsl");
}
