use crate::{
  tensor::Tensor,
  scalar::{ Numeric, Real, Gemm },
};


impl<T: Real> Tensor<T> {
  pub(crate) fn matmul(&self, rhs: &Self) -> Vec<T> {
    let rows_l = self.shape[-2];
    let cols_l = self.shape[-1];
    let cols_r = rhs.shape[-1];
    let mut data = vec![T::zero(); rows_l * cols_r];
    T::gemm(rows_l, cols_l, cols_r, &self.data, &rhs.data, &mut data);
    data
  }
}

#[cfg_attr(feature = "unsafe", allow(dead_code))]
fn naive_gemm<T: Numeric>(rows_l: usize, cols_l: usize, cols_r: usize, lhs: &[T], rhs: &[T], out: &mut [T]) {
  for i in 0..rows_l {
    for j in 0..cols_r {
      for k in 0..cols_l {
        out[i * cols_r + j] += lhs[i * cols_l + k] * rhs[k * cols_r + j];
      }
    }
  }
}

macro_rules! impl_gemm {
  ($type:ty, $kernel:ident) => {
    impl Gemm for $type {
      #[cfg(feature = "unsafe")]
      fn gemm(rows_l: usize, cols_l: usize, cols_r: usize, lhs: &[Self], rhs: &[Self], out: &mut [Self]) {
        debug_assert!(lhs.len() >= rows_l * cols_l && rhs.len() >= cols_l * cols_r && out.len() >= rows_l * cols_r);
        unsafe {
          matrixmultiply::$kernel(
            rows_l,
            cols_l,
            cols_r,
            1.0,
            lhs.as_ptr(),
            cols_l as isize,
            1,
            rhs.as_ptr(),
            cols_r as isize,
            1,
            0.0,
            out.as_mut_ptr(),
            cols_r as isize,
            1,
          );
        }
      }

      #[cfg(not(feature = "unsafe"))]
      fn gemm(rows_l: usize, cols_l: usize, cols_r: usize, lhs: &[Self], rhs: &[Self], out: &mut [Self]) {
        naive_gemm(rows_l, cols_l, cols_r, lhs, rhs, out)
      }
    }
  };
}

impl_gemm!(f32, sgemm);
impl_gemm!(f64, dgemm);
