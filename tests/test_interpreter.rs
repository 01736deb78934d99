//! Integration tests: bytecode programs vs tree evaluation
//!
//! The interpreter and the tree walker must agree bit for bit on every
//! distance, and the shader emitter must name every stage of the program.
//!
//! Author: Moroya Sakamoto

mod common;

use hinoki_csg::prelude::*;
use common::*;
use std::sync::Arc;

fn assert_program_matches_tree(shape: SdfNode) {
    init_logging();
    let shape = Arc::new(shape);
    let interpreter = SdfInterpreter::new(&shape);
    for p in test_points() {
        let from_tree = eval(&shape, p);
        let from_program = interpreter.eval(p);
        assert_eq!(
            from_tree.to_bits(),
            from_program.to_bits(),
            "divergence at {:?}: tree={}, program={}",
            p,
            from_tree,
            from_program
        );
    }
}

// ============================================================================
// Program vs tree
// ============================================================================

#[test]
fn program_matches_tree_for_brushes() {
    assert_program_matches_tree(test_sphere());
    assert_program_matches_tree(test_box());
    assert_program_matches_tree(SdfNode::torus(0.8, 0.2));
    assert_program_matches_tree(SdfNode::ellipsoid(Vec3::new(1.0, 0.5, 0.25)));
    assert_program_matches_tree(SdfNode::cylinder(0.5, 1.0));
    assert_program_matches_tree(SdfNode::cone(0.75, 1.0));
    assert_program_matches_tree(SdfNode::capped_cone(0.75, 0.25, 1.0));
    assert_program_matches_tree(SdfNode::plane(Vec3::Y));
}

#[test]
fn program_matches_tree_for_csg() {
    assert_program_matches_tree(test_csg());
    assert_program_matches_tree(test_complex_shape());
}

#[test]
fn program_matches_tree_for_posed_shapes() {
    assert_program_matches_tree(test_sphere().moved(Vec3::new(0.5, -0.25, 1.0)));
    assert_program_matches_tree(
        test_box().rotated(Quat::from_rotation_y(std::f32::consts::FRAC_PI_4)),
    );
    assert_program_matches_tree(test_sphere().scaled(3.0));
    assert_program_matches_tree(
        test_csg()
            .moved(Vec3::new(1.0, 2.0, 3.0))
            .rotated(Quat::from_rotation_z(1.0))
            .scaled(0.5),
    );
}

#[test]
fn program_matches_tree_for_flate() {
    assert_program_matches_tree(test_sphere().flate(0.25));
    assert_program_matches_tree(test_csg().flate(-0.1));
}

#[test]
fn paint_does_not_disturb_distances() {
    let red = hinoki_csg::material::Material::solid(Vec3::new(1.0, 0.0, 0.0));
    assert_program_matches_tree(test_csg().painted(&red, true));
}

// ============================================================================
// Emission
// ============================================================================

#[test]
fn shader_source_names_the_stages() {
    init_logging();
    let (source, params) = compile_shader(&test_csg());
    assert!(source.contains("SphereBrush"));
    assert!(source.contains("BoxBrush"));
    assert!(source.contains("DiffOp"));
    assert!(source.contains("PARAMS["));
    assert!(!params.is_empty());
}

#[test]
fn interpreter_program_carries_a_return() {
    init_logging();
    let interpreter = SdfInterpreter::new(&Arc::new(test_sphere()));
    assert!(interpreter.program_len() > 0);
}

// ============================================================================
// Stack shape
// ============================================================================

#[test]
fn left_leaning_chain_stays_shallow() {
    init_logging();
    // Chains of unions built leaf-by-leaf should not deepen the stack
    let mut shape = test_sphere();
    for i in 0..16 {
        shape = shape.union(SdfNode::sphere(0.25).moved(Vec3::new(i as f32, 0.0, 0.0)));
    }
    assert!(shape.stack_size() <= 2);
    assert_program_matches_tree(shape);
}
